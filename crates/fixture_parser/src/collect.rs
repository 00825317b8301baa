use pest::iterators::{Pair, Pairs};
use smol_str::SmolStr;

use crate::{AnnotationError, Expectations, Rule};

pub fn collect_expectations(pairs: Pairs<Rule>) -> Result<Expectations, AnnotationError> {
    let mut out = Expectations::default();

    collect_into(pairs, &mut out);

    if let Some(symbol) = out
        .expected
        .iter()
        .find(|sym| out.unwanted.contains(*sym))
    {
        return Err(AnnotationError::Conflict {
            symbol: symbol.clone(),
        });
    }

    Ok(out)
}

fn collect_into(pairs: Pairs<Rule>, out: &mut Expectations) {
    for pair in pairs {
        match pair.as_rule() {
            Rule::payload | Rule::token => collect_into(pair.into_inner(), out),
            Rule::forbidden => {
                let name = forbidden_name(pair);
                if !name.is_empty() {
                    out.unwanted.insert(name);
                }
            }
            Rule::symbol => {
                let name = pair.as_str().trim();
                if !name.is_empty() {
                    out.expected.push(name.into());
                }
            }
            Rule::EOI => {}
            Rule::prefix => unreachable!("prefix only appears inside forbidden"),
        }
    }
}

/// `prefix ! symbol` with the marker dropped, e.g. ` !a.b` → `a.b`.
fn forbidden_name(pair: Pair<Rule>) -> SmolStr {
    let mut text = String::new();
    for part in pair.into_inner() {
        text.push_str(part.as_str());
    }
    text.trim().into()
}
