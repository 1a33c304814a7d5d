/// All lexemes of the fusion description format.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Fusion,
    Input,
    Output,

    Ident(String),

    // Symbols
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Colon,    // :
    Comma,    // ,
    Eq,       // =
    At,       // @

    Eof,
}

impl Lexeme {
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "fusion" => Some(Lexeme::Fusion),
            "input" => Some(Lexeme::Input),
            "output" => Some(Lexeme::Output),
            _ => None,
        }
    }

    /// Human-readable description for error messages.
    pub fn description(&self) -> String {
        match self {
            Lexeme::Fusion => "'fusion'".to_string(),
            Lexeme::Input => "'input'".to_string(),
            Lexeme::Output => "'output'".to_string(),
            Lexeme::Ident(name) => format!("identifier '{}'", name),
            Lexeme::LParen => "'('".to_string(),
            Lexeme::RParen => "')'".to_string(),
            Lexeme::LBracket => "'['".to_string(),
            Lexeme::RBracket => "']'".to_string(),
            Lexeme::Colon => "':'".to_string(),
            Lexeme::Comma => "','".to_string(),
            Lexeme::Eq => "'='".to_string(),
            Lexeme::At => "'@'".to_string(),
            Lexeme::Eof => "end of file".to_string(),
        }
    }
}
