//! The input AST node set.
//!
//! The front end does not parse source text; hosts hand it a tree of the
//! node kinds below (typically as JSON -- every node derives serde). The set
//! mirrors a restricted scripting-language function: a flat parameter list
//! with optional `"uniform"`/stride annotations and a body of assignments,
//! `if`/`while` control flow, and a trailing `return` of argument names.
//!
//! Each node can carry the 1-based source line it came from (`0` = unknown);
//! errors and generated-code comments reference it. [`AstStmt::render`]
//! reconstructs a source-like line for those comments so JSON producers do
//! not need to ship source text.

use serde::{Deserialize, Serialize};

/// A function definition: the root of a kernel's AST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Decorator names, if the host saw any. Decorated functions are
    /// rejected by the lowerer.
    #[serde(default)]
    pub decorators: Vec<String>,
    pub params: Vec<Param>,
    pub body: Vec<AstStmt>,
}

/// One function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<ParamAnnotation>,
}

/// Parameter annotation: a positive integer stride or the string
/// `"uniform"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamAnnotation {
    Stride(u32),
    Keyword(String),
}

/// Binary arithmetic/bitwise operators as they appear in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstBinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AstBinOp {
    /// Source spelling, used for rendered comments.
    pub fn token(self) -> &'static str {
        match self {
            AstBinOp::Add => "+",
            AstBinOp::Sub => "-",
            AstBinOp::Mul => "*",
            AstBinOp::Div => "/",
            AstBinOp::FloorDiv => "//",
            AstBinOp::Mod => "%",
            AstBinOp::Pow => "**",
            AstBinOp::BitAnd => "&",
            AstBinOp::BitOr => "|",
            AstBinOp::BitXor => "^",
            AstBinOp::Shl => "<<",
            AstBinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstUnaryOp {
    /// Unary `+` (identity).
    Pos,
    /// Unary `-`.
    Neg,
    /// Bitwise `~`.
    Invert,
    /// Logical `not`.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstCmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl AstCmpOp {
    pub fn token(self) -> &'static str {
        match self {
            AstCmpOp::Eq => "==",
            AstCmpOp::Ne => "!=",
            AstCmpOp::Lt => "<",
            AstCmpOp::Le => "<=",
            AstCmpOp::Gt => ">",
            AstCmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstBoolOp {
    And,
    Or,
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AstExpr {
    Num {
        value: f64,
    },
    Str {
        value: String,
    },
    Name {
        id: String,
    },
    BinOp {
        left: Box<AstExpr>,
        op: AstBinOp,
        right: Box<AstExpr>,
    },
    UnaryOp {
        op: AstUnaryOp,
        operand: Box<AstExpr>,
    },
    Compare {
        left: Box<AstExpr>,
        op: AstCmpOp,
        right: Box<AstExpr>,
    },
    BoolOp {
        op: AstBoolOp,
        values: Vec<AstExpr>,
    },
    Call {
        func: Box<AstExpr>,
        args: Vec<AstExpr>,
    },
    Attribute {
        value: Box<AstExpr>,
        attr: String,
    },
    Subscript {
        value: Box<AstExpr>,
        index: Box<AstExpr>,
    },
    /// Tuples appear only in assignment targets/values and `return`.
    Tuple {
        elts: Vec<AstExpr>,
    },
}

/// Statement nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AstStmt {
    Assign {
        #[serde(default)]
        line: u32,
        targets: Vec<AstExpr>,
        value: AstExpr,
    },
    AugAssign {
        #[serde(default)]
        line: u32,
        target: AstExpr,
        op: AstBinOp,
        value: AstExpr,
    },
    If {
        #[serde(default)]
        line: u32,
        test: AstExpr,
        body: Vec<AstStmt>,
        #[serde(default)]
        orelse: Vec<AstStmt>,
    },
    While {
        #[serde(default)]
        line: u32,
        test: AstExpr,
        body: Vec<AstStmt>,
    },
    Return {
        #[serde(default)]
        line: u32,
        #[serde(default)]
        value: Option<AstExpr>,
    },
    /// An expression in statement position: a docstring, or rejected.
    Expr {
        #[serde(default)]
        line: u32,
        value: AstExpr,
    },
    Pass {
        #[serde(default)]
        line: u32,
    },
}

impl AstStmt {
    /// Source line this statement came from (0 = unknown).
    pub fn line(&self) -> u32 {
        match self {
            AstStmt::Assign { line, .. }
            | AstStmt::AugAssign { line, .. }
            | AstStmt::If { line, .. }
            | AstStmt::While { line, .. }
            | AstStmt::Return { line, .. }
            | AstStmt::Expr { line, .. }
            | AstStmt::Pass { line } => *line,
        }
    }

    /// Reconstruct a source-like line for generated-code comments.
    pub fn render(&self) -> String {
        match self {
            AstStmt::Assign { targets, value, .. } => {
                let targets: Vec<String> = targets.iter().map(|t| t.render()).collect();
                format!("{} = {}", targets.join(" = "), value.render())
            }
            AstStmt::AugAssign {
                target, op, value, ..
            } => {
                format!("{} {}= {}", target.render(), op.token(), value.render())
            }
            AstStmt::If { test, .. } => format!("if {}:", test.render()),
            AstStmt::While { test, .. } => format!("while {}:", test.render()),
            AstStmt::Return { value, .. } => match value {
                Some(value) => format!("return {}", value.render()),
                None => "return".to_string(),
            },
            AstStmt::Expr { value, .. } => value.render(),
            AstStmt::Pass { .. } => "pass".to_string(),
        }
    }
}

impl AstExpr {
    /// Render an expression back to source-like text. Nested operators are
    /// parenthesized rather than precedence-analyzed.
    pub fn render(&self) -> String {
        self.render_prec(false)
    }

    fn render_prec(&self, nested: bool) -> String {
        let wrap = |text: String| {
            if nested {
                format!("({})", text)
            } else {
                text
            }
        };
        match self {
            AstExpr::Num { value } => format!("{}", value),
            AstExpr::Str { value } => format!("{:?}", value),
            AstExpr::Name { id } => id.clone(),
            AstExpr::BinOp { left, op, right } => wrap(format!(
                "{} {} {}",
                left.render_prec(true),
                op.token(),
                right.render_prec(true)
            )),
            AstExpr::UnaryOp { op, operand } => {
                let token = match op {
                    AstUnaryOp::Pos => "+",
                    AstUnaryOp::Neg => "-",
                    AstUnaryOp::Invert => "~",
                    AstUnaryOp::Not => "not ",
                };
                wrap(format!("{}{}", token, operand.render_prec(true)))
            }
            AstExpr::Compare { left, op, right } => wrap(format!(
                "{} {} {}",
                left.render_prec(true),
                op.token(),
                right.render_prec(true)
            )),
            AstExpr::BoolOp { op, values } => {
                let token = match op {
                    AstBoolOp::And => " and ",
                    AstBoolOp::Or => " or ",
                };
                let parts: Vec<String> = values.iter().map(|v| v.render_prec(true)).collect();
                wrap(parts.join(token))
            }
            AstExpr::Call { func, args } => {
                let args: Vec<String> = args.iter().map(|a| a.render()).collect();
                format!("{}({})", func.render(), args.join(", "))
            }
            AstExpr::Attribute { value, attr } => format!("{}.{}", value.render(), attr),
            AstExpr::Subscript { value, index } => {
                format!("{}[{}]", value.render(), index.render())
            }
            AstExpr::Tuple { elts } => {
                let parts: Vec<String> = elts.iter().map(|e| e.render()).collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(id: &str) -> AstExpr {
        AstExpr::Name { id: id.into() }
    }

    #[test]
    fn render_assignment() {
        let stmt = AstStmt::Assign {
            line: 3,
            targets: vec![name("b")],
            value: AstExpr::BinOp {
                left: Box::new(AstExpr::BinOp {
                    left: Box::new(name("plus")),
                    op: AstBinOp::Mul,
                    right: Box::new(name("minus")),
                }),
                op: AstBinOp::Add,
                right: Box::new(AstExpr::Num { value: 1.0 }),
            },
        };
        assert_eq!(stmt.render(), "b = (plus * minus) + 1");
        assert_eq!(stmt.line(), 3);
    }

    #[test]
    fn render_control_flow_and_calls() {
        let cond = AstExpr::Compare {
            left: Box::new(name("x")),
            op: AstCmpOp::Gt,
            right: Box::new(AstExpr::Num { value: 0.0 }),
        };
        let stmt = AstStmt::If {
            line: 1,
            test: cond,
            body: vec![],
            orelse: vec![],
        };
        assert_eq!(stmt.render(), "if x > 0:");

        let call = AstExpr::Call {
            func: Box::new(AstExpr::Attribute {
                value: Box::new(name("math")),
                attr: "sqrt".into(),
            }),
            args: vec![name("x")],
        };
        assert_eq!(call.render(), "math.sqrt(x)");
    }

    #[test]
    fn render_aug_assign_and_return() {
        let stmt = AstStmt::AugAssign {
            line: 2,
            target: name("x"),
            op: AstBinOp::Div,
            value: AstExpr::Num { value: 2.0 },
        };
        assert_eq!(stmt.render(), "x /= 2");

        let ret = AstStmt::Return {
            line: 9,
            value: Some(AstExpr::Tuple {
                elts: vec![name("b"), name("y")],
            }),
        };
        assert_eq!(ret.render(), "return (b, y)");
    }

    #[test]
    fn annotation_json_accepts_strides_and_keywords() {
        let p: Param = serde_json::from_str(r#"{"name": "pair", "annotation": 2}"#).unwrap();
        assert_eq!(p.annotation, Some(ParamAnnotation::Stride(2)));

        let p: Param =
            serde_json::from_str(r#"{"name": "a", "annotation": "uniform"}"#).unwrap();
        assert_eq!(p.annotation, Some(ParamAnnotation::Keyword("uniform".into())));

        let p: Param = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(p.annotation, None);
    }

    #[test]
    fn function_json_roundtrip() {
        let json = r#"{
            "name": "scale",
            "params": [
                {"name": "x"},
                {"name": "a", "annotation": "uniform"}
            ],
            "body": [
                {"kind": "assign", "line": 2, "targets": [{"kind": "name", "id": "x"}],
                 "value": {"kind": "bin_op",
                           "left": {"kind": "name", "id": "x"},
                           "op": "mul",
                           "right": {"kind": "name", "id": "a"}}},
                {"kind": "return", "line": 3, "value": {"kind": "name", "id": "x"}}
            ]
        }"#;
        let func: FunctionDef = serde_json::from_str(json).unwrap();
        assert_eq!(func.name, "scale");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.body.len(), 2);
        assert!(func.decorators.is_empty());

        let back = serde_json::to_string(&func).unwrap();
        let func2: FunctionDef = serde_json::from_str(&back).unwrap();
        assert_eq!(func2.body, func.body);
    }
}
