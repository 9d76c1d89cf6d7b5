/// Value a task or test resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Val {
    None,
    Int(i64),
    String(String),
}
