//! Function declarations and the program that holds them.

use crate::{Error, Result};
use coeffects::{CapabilitySet, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// What a call statement calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A function known by name at declaration time.
    Function(String),
    /// Whatever value was passed in this parameter slot.
    Param(usize),
}

/// An argument expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Null,
    Function(String),
    Param(usize),
}

/// One statement of a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stmt {
    /// Call `call` with `args`. A call through a null parameter is skipped.
    Call {
        call: Target,
        #[serde(default)]
        args: Vec<Arg>,
    },
    /// Append text to the program output.
    Echo { echo: String },
}

impl Stmt {
    /// `if ($fn) $fn(null)` on parameter `index`.
    pub fn call_param_with_null(index: usize) -> Self {
        Stmt::Call {
            call: Target::Param(index),
            args: vec![Arg::Null],
        }
    }
}

/// A declared function. Its capability set is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDecl {
    name: String,
    capabilities: CapabilitySet,
    params: usize,
    body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn new(
        name: impl Into<String>,
        capabilities: CapabilitySet,
        params: usize,
        body: Vec<Stmt>,
    ) -> Self {
        Self {
            name: name.into(),
            capabilities,
            params,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn params(&self) -> usize {
        self.params
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }
}

/// On-disk form of a function.
#[derive(Debug, Clone, Deserialize)]
struct FunctionEntry {
    name: String,
    /// Omitted means `defaults`; `[]` means pure.
    contexts: Option<Vec<String>>,
    #[serde(default)]
    params: usize,
    #[serde(default)]
    body: Vec<Stmt>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProgramFile {
    entry: Option<String>,
    #[serde(default, rename = "function")]
    functions: Vec<FunctionEntry>,
}

/// The fixture's callers, in enumeration order.
pub const FIXTURE: [(&str, Context); 8] = [
    ("non_policied", Context::Defaults),
    ("policied_local", Context::PoliciedLocal),
    ("policied_shallow", Context::PoliciedShallow),
    ("policied", Context::Policied),
    ("policied_of_local", Context::PoliciedOfLocal),
    ("policied_of_shallow", Context::PoliciedOfShallow),
    ("policied_of", Context::PoliciedOf),
    ("pure", Context::Pure),
];

/// A validated set of declarations, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    functions: Vec<FunctionDecl>,
    index: HashMap<String, usize>,
    entry: Option<String>,
}

impl Program {
    /// Build a program, rejecting duplicate names and dangling references.
    pub fn new(functions: Vec<FunctionDecl>, entry: Option<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(functions.len());
        for (i, decl) in functions.iter().enumerate() {
            if index.insert(decl.name.clone(), i).is_some() {
                return Err(Error::DuplicateFunction(decl.name.clone()));
            }
        }

        let program = Self {
            functions,
            index,
            entry,
        };
        program.validate()?;
        Ok(program)
    }

    /// The one-parameter functions of the call-enforcement fixture, each
    /// calling its argument with `null` when it is set.
    pub fn fixture() -> Result<Self> {
        let functions = FIXTURE
            .iter()
            .map(|(name, ctx)| {
                FunctionDecl::new(*name, (*ctx).into(), 1, vec![Stmt::call_param_with_null(0)])
            })
            .collect();
        Self::new(functions, None)
    }

    /// Load a program from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a program from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let file: ProgramFile = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        let functions = file
            .functions
            .into_iter()
            .map(|f| {
                let capabilities = match f.contexts {
                    Some(names) => CapabilitySet::parse(names.as_slice())?,
                    None => CapabilitySet::defaults(),
                };
                Ok(FunctionDecl::new(f.name, capabilities, f.params, f.body))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(functions, file.entry)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    /// Like [`Program::function`], but a missing name is an error.
    pub fn resolve(&self, name: &str) -> Result<&FunctionDecl> {
        self.function(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    pub fn functions(&self) -> &[FunctionDecl] {
        &self.functions
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    fn validate(&self) -> Result<()> {
        if let Some(entry) = &self.entry {
            self.resolve(entry)?;
        }

        for decl in &self.functions {
            let check_param = |index: usize| {
                if index < decl.params {
                    Ok(())
                } else {
                    Err(Error::MissingArgument {
                        function: decl.name.clone(),
                        index,
                    })
                }
            };

            for stmt in &decl.body {
                let Stmt::Call { call, args } = stmt else {
                    continue;
                };
                match call {
                    Target::Function(name) => {
                        self.resolve(name)?;
                    }
                    Target::Param(i) => check_param(*i)?,
                }
                for arg in args {
                    match arg {
                        Arg::Null => {}
                        Arg::Function(name) => {
                            self.resolve(name)?;
                        }
                        Arg::Param(i) => check_param(*i)?,
                    }
                }
            }
        }
        Ok(())
    }
}
