mod builder;
mod matcher;
mod nfa;

pub use self::builder::Builder;
pub use self::matcher::Matcher;
