//! Compiler configuration.
//!
//! A `CompilerConfig` carries the optimization switch and the syscall
//! surface the embedding host wants Nano programs to see. The CLI can load
//! one from a TOML file; embedders build one in code:
//!
//! ```rust,ignore
//! let config = CompilerConfig::standard()
//!     .with_syscall("draw-line", 4)
//!     .with_syscall("log", -1); // negative arity = varargs
//! ```

use serde::Deserialize;
use std::path::Path;

/// Declaration of one host syscall, as the compiler sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct SyscallDecl {
    /// Name callable from Nano code.
    pub name: String,
    /// Declared argument count; negative means variable arity.
    pub num_args: i32,
}

impl SyscallDecl {
    pub fn new(name: impl Into<String>, num_args: i32) -> Self {
        SyscallDecl {
            name: name.into(),
            num_args,
        }
    }

    pub fn is_varargs(&self) -> bool {
        self.num_args < 0
    }
}

/// Options applied to a compile session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Enable the AST optimizer.
    pub optimize: bool,
    /// Syscalls visible to compiled programs.
    pub syscalls: Vec<SyscallDecl>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            optimize: true,
            syscalls: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// The built-in syscall set every host is expected to provide.
    pub fn standard() -> Self {
        let mut config = CompilerConfig::new();
        for (name, num_args) in STANDARD_SYSCALLS {
            config.syscalls.push(SyscallDecl::new(*name, *num_args));
        }
        config
    }

    pub fn with_syscall(mut self, name: impl Into<String>, num_args: i32) -> Self {
        self.syscalls.push(SyscallDecl::new(name, num_args));
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Load options from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }
}

/// Name and arity of each standard built-in.
pub const STANDARD_SYSCALLS: &[(&str, i32)] = &[
    ("abs", 1),
    ("min", 2),
    ("max", 2),
    ("len", 1),
    ("bitand", 2),
    ("sin", 1),
    ("cos", 1),
    ("tan", 1),
    ("sqrt", 1),
    ("round", 1),
    ("ceil", 1),
    ("floor", 1),
    ("chr", 1),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_set_matches_the_builtin_table() {
        let config = CompilerConfig::standard();
        assert_eq!(config.syscalls.len(), STANDARD_SYSCALLS.len());
        assert!(config.syscalls.iter().any(|s| s.name == "abs"));
        assert!(config.optimize);
    }

    #[test]
    fn negative_arity_is_varargs() {
        let config = CompilerConfig::new().with_syscall("log", -1);
        assert!(config.syscalls[0].is_varargs());
    }

    #[test]
    fn toml_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "optimize = false").unwrap();
        writeln!(file, "[[syscalls]]").unwrap();
        writeln!(file, "name = \"beep\"").unwrap();
        writeln!(file, "num_args = 0").unwrap();

        let config = CompilerConfig::from_toml_file(file.path()).unwrap();
        assert!(!config.optimize);
        assert_eq!(config.syscalls.len(), 1);
        assert_eq!(config.syscalls[0].name, "beep");
    }
}
