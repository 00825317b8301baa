use std::path::Path;

use derive_more::Display;

/// The two source syntaxes a fixture can be written in. The dialect decides
/// the comment marker that introduces an annotation, the file name the
/// completion service sees, and which candidate name field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Dialect {
    #[display("TypeScript")]
    TypeScript,
    /// The alternate dialect: candidates are compared by their
    /// dialect-qualified name.
    #[display("Python")]
    Python,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::TypeScript, Dialect::Python];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" => Some(Dialect::TypeScript),
            "py" => Some(Dialect::Python),
            _ => None,
        }
    }

    /// Dialect implied by a fixture's file name, if it has a recognized
    /// extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Dialect::TypeScript => "ts",
            Dialect::Python => "py",
        }
    }

    /// Comment marker that starts an annotation.
    pub fn marker(self) -> &'static str {
        match self {
            Dialect::TypeScript => "//",
            Dialect::Python => "#",
        }
    }

    /// In-service identity of the fixture. The real fixture path is never
    /// sent; every fixture of a dialect is presented under this one name.
    pub fn synthetic_file_name(self) -> &'static str {
        match self {
            Dialect::TypeScript => "main.ts",
            Dialect::Python => "main.py",
        }
    }

    pub fn is_alternate(self) -> bool {
        self == Dialect::Python
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path() {
        assert_eq!(Dialect::from_path(Path::new("cases/a.ts")), Some(Dialect::TypeScript));
        assert_eq!(Dialect::from_path(Path::new("b.py")), Some(Dialect::Python));
        assert_eq!(Dialect::from_path(Path::new("c.js")), None);
        assert_eq!(Dialect::from_path(Path::new("README")), None);
    }

    #[test]
    fn python_is_the_alternate_dialect() {
        assert!(Dialect::Python.is_alternate());
        assert!(!Dialect::TypeScript.is_alternate());
        assert_eq!(Dialect::Python.marker(), "#");
        assert_eq!(Dialect::TypeScript.marker(), "//");
    }

    #[test]
    fn extension_roundtrip() {
        for dialect in Dialect::ALL {
            assert_eq!(Dialect::from_extension(dialect.extension()), Some(dialect));
            assert!(dialect.synthetic_file_name().ends_with(dialect.extension()));
        }
    }
}
