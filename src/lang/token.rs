//! Token kinds and the command/clause keyword table.

// ── Keywords ───────────────────────────────────────────────────────

/// Command and clause keywords. Identifier text is kept alongside the tag,
/// so a word that doubles as a field or function name still works in
/// expression position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    Accept,
    All,
    Append,
    Average,
    Blank,
    Bottom,
    Cancel,
    Clear,
    Close,
    Continue,
    Count,
    Create,
    Databases,
    Declare,
    Delete,
    Descending,
    Display,
    Find,
    For,
    From,
    Get,
    Go,
    Goto,
    Help,
    Index,
    Indexes,
    Input,
    List,
    Local,
    Locate,
    Next,
    Off,
    On,
    Order,
    Pack,
    Private,
    Public,
    Quit,
    Read,
    Recall,
    Record,
    Reindex,
    Release,
    Replace,
    Rest,
    Return,
    Say,
    Seek,
    Select,
    Set,
    Skip,
    Store,
    Structure,
    Sum,
    To,
    Top,
    Unique,
    Use,
    Wait,
    While,
    With,
    Zap,
}

/// Case-insensitive keyword lookup.
pub fn keyword(text: &str) -> Option<Kw> {
    let upper = text.to_ascii_uppercase();
    let kw = match upper.as_str() {
        "ACCEPT" => Kw::Accept,
        "ALL" => Kw::All,
        "APPEND" => Kw::Append,
        "AVERAGE" => Kw::Average,
        "BLANK" => Kw::Blank,
        "BOTTOM" => Kw::Bottom,
        "CANCEL" => Kw::Cancel,
        "CLEAR" => Kw::Clear,
        "CLOSE" => Kw::Close,
        "CONTINUE" => Kw::Continue,
        "COUNT" => Kw::Count,
        "CREATE" => Kw::Create,
        "DATABASES" => Kw::Databases,
        "DECLARE" => Kw::Declare,
        "DELETE" => Kw::Delete,
        "DESCENDING" => Kw::Descending,
        "DISPLAY" => Kw::Display,
        "FIND" => Kw::Find,
        "FOR" => Kw::For,
        "FROM" => Kw::From,
        "GET" => Kw::Get,
        "GO" => Kw::Go,
        "GOTO" => Kw::Goto,
        "HELP" => Kw::Help,
        "INDEX" => Kw::Index,
        "INDEXES" => Kw::Indexes,
        "INPUT" => Kw::Input,
        "LIST" => Kw::List,
        "LOCAL" => Kw::Local,
        "LOCATE" => Kw::Locate,
        "NEXT" => Kw::Next,
        "OFF" => Kw::Off,
        "ON" => Kw::On,
        "ORDER" => Kw::Order,
        "PACK" => Kw::Pack,
        "PRIVATE" => Kw::Private,
        "PUBLIC" => Kw::Public,
        "QUIT" => Kw::Quit,
        "READ" => Kw::Read,
        "RECALL" => Kw::Recall,
        "RECORD" => Kw::Record,
        "REINDEX" => Kw::Reindex,
        "RELEASE" => Kw::Release,
        "REPLACE" => Kw::Replace,
        "REST" => Kw::Rest,
        "RETURN" => Kw::Return,
        "SAY" => Kw::Say,
        "SEEK" => Kw::Seek,
        "SELECT" => Kw::Select,
        "SET" => Kw::Set,
        "SKIP" => Kw::Skip,
        "STORE" => Kw::Store,
        "STRUCTURE" => Kw::Structure,
        "SUM" => Kw::Sum,
        "TO" => Kw::To,
        "TOP" => Kw::Top,
        "UNIQUE" => Kw::Unique,
        "USE" => Kw::Use,
        "WAIT" => Kw::Wait,
        "WHILE" => Kw::While,
        "WITH" => Kw::With,
        "ZAP" => Kw::Zap,
        _ => return None,
    };
    Some(kw)
}

// ── Tokens ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input line.
    End,
    Number(f64),
    Str(String),
    /// Date literal normalized to YYYYMMDD ("" for an empty date).
    DateLit(String),
    /// Identifier or keyword; `kw` is set when the text matches the table.
    Word { text: String, kw: Option<Kw> },
    /// Dotted logical literals .T./.Y. and .F./.N.
    True,
    False,
    /// Dotted operators .AND. .OR. .NOT.
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    LParen,
    RParen,
    Comma,
    LBracket,
    RBracket,
    /// `=` (comparison or assignment, decided by position)
    Eq,
    /// `==` exact comparison
    EqEq,
    /// `<>`, `!=` or `#`
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `:=`
    Assign,
    /// `->`
    Arrow,
    Question,
    DoubleQuestion,
    /// `$` containment
    Dollar,
    /// `&` macro prefix
    Amp,
    At,
}

impl Token {
    /// The keyword tag if this is a keyword word.
    pub fn kw(&self) -> Option<Kw> {
        match self {
            Token::Word { kw, .. } => *kw,
            _ => None,
        }
    }

    /// Identifier text if this is any word.
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Word { text, .. } => Some(text),
            _ => None,
        }
    }
}
