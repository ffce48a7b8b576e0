/// Name given to the function synthesized around a bare top-level expression.
///
/// Identifiers must start with a letter, so user code can never refer to it.
pub const ANON_FN_NAME: &str = "__anon_expr";

#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

impl Prototype {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Prototype {
            name: name.into(),
            args,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Number(f64),
    Variable(String),
    Binary(char, Box<Expression>, Box<Expression>),
    Call(String, Vec<Expression>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expression,
}

impl Function {
    /// wrap a bare expression into a zero-argument function
    pub fn anonymous(body: Expression) -> Self {
        Function {
            prototype: Prototype::new(ANON_FN_NAME, Vec::new()),
            body,
        }
    }
}

/// One top-level construct of a session.
#[derive(Debug, PartialEq, Clone)]
pub enum ASTNode {
    Extern(Prototype),
    Definition(Function),
    Expression(Function),
}

impl ASTNode {
    pub fn describe(&self) -> &'static str {
        match self {
            ASTNode::Extern(_) => "an extern",
            ASTNode::Definition(_) => "a function definition",
            ASTNode::Expression(_) => "a top-level expression",
        }
    }
}
