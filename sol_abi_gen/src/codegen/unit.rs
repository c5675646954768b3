use crate::codegen::lines::Lines;
use crate::codegen::yul::{Block, Expr, render_literal};
use crate::error::{GenError, GenResult};
use alloy_primitives::U256;
use indexmap::IndexMap;
use sol_abi_types::StateMutability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    /// Yul function, spliced into an assembly block.
    Yul,
    /// Solidity function whose body is a single assembly block.
    Solidity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Solidity type, only rendered for `RoutineKind::Solidity`.
    pub sol_type: String,
}

impl Param {
    pub fn word(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sol_type: "uint256".into(),
        }
    }

    pub fn typed(name: impl Into<String>, sol_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sol_type: sol_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    pub name: String,
    pub kind: RoutineKind,
    pub params: Vec<Param>,
    pub returns: Vec<Param>,
    pub mutability: StateMutability,
    pub body: Block,
}

impl Routine {
    pub fn yul(name: impl Into<String>, params: &[&str], returns: &[&str], body: Block) -> Self {
        Self {
            name: name.into(),
            kind: RoutineKind::Yul,
            params: params.iter().map(|p| Param::word(*p)).collect(),
            returns: returns.iter().map(|r| Param::word(*r)).collect(),
            mutability: StateMutability::Pure,
            body,
        }
    }

    pub fn with_mutability(mut self, mutability: StateMutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn to_lines(&self, memory_safe: bool) -> Lines {
        let names = |ps: &[Param]| ps.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ");
        let mut out = Lines::new();
        match self.kind {
            RoutineKind::Yul => {
                let returns = if self.returns.is_empty() {
                    String::new()
                } else {
                    format!(" -> {}", names(&self.returns))
                };
                out.line(format!("function {}({}){} {{", self.name, names(&self.params), returns));
                out.nest(self.body.to_lines());
                out.line("}");
            }
            RoutineKind::Solidity => {
                let typed = |ps: &[Param]| {
                    ps.iter()
                        .map(|p| format!("{} {}", p.sol_type, p.name))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let mutability = match self.mutability {
                    StateMutability::NonPayable => String::new(),
                    m => format!(" {}", m.as_str()),
                };
                let returns = if self.returns.is_empty() {
                    String::new()
                } else {
                    format!(" returns ({})", typed(&self.returns))
                };
                out.line(format!(
                    "function {}({}){}{} {{",
                    self.name,
                    typed(&self.params),
                    mutability,
                    returns
                ));
                let mut inner = Lines::new();
                inner.line(format!("assembly{} {{", if memory_safe { " (\"memory-safe\")" } else { "" }));
                inner.nest(self.body.to_lines());
                inner.line("}");
                out.nest(inner);
                out.line("}");
            }
        }
        out
    }
}

/// Where generated routines and constants go.
///
/// Both operations are idempotent by name: re-adding an identical routine
/// or constant is a no-op, re-adding a different one under the same name
/// is an error.
pub trait CodeSink {
    fn add_routine(&mut self, routine: Routine) -> GenResult<String>;
    fn add_constant(&mut self, name: &str, value: U256) -> GenResult<Expr>;
    fn has_routine(&self, name: &str) -> bool;
}

/// In-memory sink preserving insertion order.
#[derive(Debug, Default, Clone)]
pub struct CodeUnit {
    routines: IndexMap<String, Routine>,
    constants: IndexMap<String, U256>,
}

impl CodeUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.get(name)
    }

    pub fn routines(&self) -> impl Iterator<Item = &Routine> {
        self.routines.values()
    }

    pub fn routine_count(&self) -> usize {
        self.routines.len()
    }

    pub fn constant(&self, name: &str) -> Option<U256> {
        self.constants.get(name).copied()
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, U256)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Constants first, then Solidity-level routines, then every Yul routine
    /// inside one assembly block of the free function `container`.
    pub fn to_lines(&self, container: &str, memory_safe: bool) -> Lines {
        let mut out = Lines::new();
        for (name, value) in &self.constants {
            out.line(format!("uint256 constant {name} = {};", render_literal(*value)));
        }
        for routine in self.routines.values().filter(|r| r.kind == RoutineKind::Solidity) {
            if !out.is_empty() {
                out.blank();
            }
            out.append(routine.to_lines(memory_safe));
        }
        let yul: Vec<&Routine> = self.routines.values().filter(|r| r.kind == RoutineKind::Yul).collect();
        if !yul.is_empty() {
            if !out.is_empty() {
                out.blank();
            }
            out.line(format!("function {container}() pure {{"));
            let mut assembly = Lines::new();
            assembly.line(format!("assembly{} {{", if memory_safe { " (\"memory-safe\")" } else { "" }));
            let mut functions = Lines::new();
            for (i, routine) in yul.iter().enumerate() {
                if i > 0 {
                    functions.blank();
                }
                functions.append(routine.to_lines(memory_safe));
            }
            assembly.nest(functions);
            assembly.line("}");
            out.nest(assembly);
            out.line("}");
        }
        out
    }

    pub fn render(&self, container: &str, memory_safe: bool) -> String {
        self.to_lines(container, memory_safe).render("    ")
    }
}

impl CodeSink for CodeUnit {
    fn add_routine(&mut self, routine: Routine) -> GenResult<String> {
        let name = routine.name.clone();
        match self.routines.get(&name) {
            Some(existing) if *existing == routine => Ok(name),
            Some(_) => Err(GenError::RoutineConflict(name)),
            None => {
                self.routines.insert(name.clone(), routine);
                Ok(name)
            }
        }
    }

    fn add_constant(&mut self, name: &str, value: U256) -> GenResult<Expr> {
        match self.constants.get(name) {
            Some(existing) if *existing != value => Err(GenError::ConstantConflict {
                name: name.to_string(),
                existing: render_literal(*existing),
                requested: render_literal(value),
            }),
            Some(_) => Ok(Expr::Constant(name.to_string())),
            None => {
                self.constants.insert(name.to_string(), value);
                Ok(Expr::Constant(name.to_string()))
            }
        }
    }

    fn has_routine(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::yul::{Stmt, ident, lit};
    use pretty_assertions::assert_eq;

    fn id_routine(body: Block) -> Routine {
        Routine::yul("id", &["x"], &["y"], body)
    }

    #[test]
    fn routines_are_idempotent_by_name() {
        let mut unit = CodeUnit::new();
        let body = Block(vec![Stmt::assign("y", ident("x"))]);
        assert_eq!(unit.add_routine(id_routine(body.clone())).unwrap(), "id");
        assert_eq!(unit.add_routine(id_routine(body)).unwrap(), "id");
        assert_eq!(unit.routine_count(), 1);
        let other = Block(vec![Stmt::assign("y", lit(1))]);
        assert_eq!(unit.add_routine(id_routine(other)), Err(GenError::RoutineConflict("id".into())));
    }

    #[test]
    fn constants_refuse_rebinding() {
        let mut unit = CodeUnit::new();
        unit.add_constant("OneWord", U256::from(32)).unwrap();
        unit.add_constant("OneWord", U256::from(32)).unwrap();
        assert!(matches!(
            unit.add_constant("OneWord", U256::from(33)),
            Err(GenError::ConstantConflict { .. })
        ));
    }

    #[test]
    fn render_layout() {
        let mut unit = CodeUnit::new();
        unit.add_constant("OneWord", U256::from(32)).unwrap();
        unit.add_routine(id_routine(Block(vec![Stmt::assign("y", ident("x"))]))).unwrap();
        assert_eq!(
            unit.render("sol_abi_routines", true),
            "uint256 constant OneWord = 0x20;\n\
             \n\
             function sol_abi_routines() pure {\n\
             \x20   assembly (\"memory-safe\") {\n\
             \x20       function id(x) -> y {\n\
             \x20           y := x\n\
             \x20       }\n\
             \x20   }\n\
             }\n"
        );
    }
}
