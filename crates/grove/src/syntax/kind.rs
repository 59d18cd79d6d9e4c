//
// syntax/kind.rs
//
// Closed set of token and node kinds produced by the parser
//

/// Every token and node kind the parser produces.
///
/// Tokens and nodes share one enum so that a tree element can be matched
/// without first asking which half of the tree it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyntaxKind {
    // Tokens
    LowerIdent,
    UpperIdent,
    Operator,
    Number,
    StringLit,
    CharLit,
    ModuleKw,
    ExposingKw,
    ImportKw,
    AsKw,
    TypeKw,
    AliasKw,
    PortKw,
    LetKw,
    InKw,
    CaseKw,
    OfKw,
    IfKw,
    ThenKw,
    ElseKw,
    InfixKw,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Equals,
    Colon,
    Pipe,
    Arrow,
    Backslash,
    Dot,
    DoubleDot,
    Underscore,
    ErrorToken,

    // Module structure
    File,
    ModuleDeclaration,
    ModuleName,
    ImportClause,
    AsClause,
    ExposingList,
    ExposedValue,
    ExposedType,
    ExposedConstructors,
    ExposedOperator,

    // Declarations
    ValueDeclaration,
    FunctionDeclarationLeft,
    TypeAnnotation,
    TypeDeclaration,
    UnionVariant,
    TypeAliasDeclaration,
    PortAnnotation,
    InfixDeclaration,

    // Types
    TypeExpression,
    TypeRef,
    TypeVariable,
    RecordType,
    FieldType,
    TupleType,
    UnitType,

    // Expressions
    ValueRef,
    ConstructorRef,
    OperatorRef,
    OperatorFunction,
    FieldAccess,
    FieldAccessor,
    Call,
    BinOp,
    Negate,
    Parenthesized,
    Tuple,
    Unit,
    List,
    Record,
    RecordUpdate,
    RecordField,
    LetIn,
    CaseOf,
    CaseBranch,
    IfElse,
    Lambda,
    Literal,

    // Patterns
    AsPattern,
    VarPattern,
    WildcardPattern,
    ConstructorPattern,
    RecordPattern,
    TuplePattern,
    ListPattern,
    ConsPattern,
    UnitPattern,
    LiteralPattern,
    ParenPattern,

    // Recovery
    Error,
    Missing,
}

impl SyntaxKind {
    pub fn is_token(self) -> bool {
        self <= SyntaxKind::ErrorToken
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            SyntaxKind::ModuleKw
                | SyntaxKind::ExposingKw
                | SyntaxKind::ImportKw
                | SyntaxKind::AsKw
                | SyntaxKind::TypeKw
                | SyntaxKind::AliasKw
                | SyntaxKind::PortKw
                | SyntaxKind::LetKw
                | SyntaxKind::InKw
                | SyntaxKind::CaseKw
                | SyntaxKind::OfKw
                | SyntaxKind::IfKw
                | SyntaxKind::ThenKw
                | SyntaxKind::ElseKw
                | SyntaxKind::InfixKw
        )
    }

    /// Nodes that stand for an expression.
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            SyntaxKind::ValueRef
                | SyntaxKind::ConstructorRef
                | SyntaxKind::OperatorFunction
                | SyntaxKind::FieldAccess
                | SyntaxKind::FieldAccessor
                | SyntaxKind::Call
                | SyntaxKind::BinOp
                | SyntaxKind::Negate
                | SyntaxKind::Parenthesized
                | SyntaxKind::Tuple
                | SyntaxKind::Unit
                | SyntaxKind::List
                | SyntaxKind::Record
                | SyntaxKind::RecordUpdate
                | SyntaxKind::LetIn
                | SyntaxKind::CaseOf
                | SyntaxKind::IfElse
                | SyntaxKind::Lambda
                | SyntaxKind::Literal
                | SyntaxKind::Missing
        )
    }

    /// Nodes that stand for a pattern.
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            SyntaxKind::AsPattern
                | SyntaxKind::VarPattern
                | SyntaxKind::WildcardPattern
                | SyntaxKind::ConstructorPattern
                | SyntaxKind::RecordPattern
                | SyntaxKind::TuplePattern
                | SyntaxKind::ListPattern
                | SyntaxKind::ConsPattern
                | SyntaxKind::UnitPattern
                | SyntaxKind::LiteralPattern
                | SyntaxKind::ParenPattern
        )
    }

    /// Nodes that stand for a type.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            SyntaxKind::TypeExpression
                | SyntaxKind::TypeRef
                | SyntaxKind::TypeVariable
                | SyntaxKind::RecordType
                | SyntaxKind::TupleType
                | SyntaxKind::UnitType
        )
    }

    /// Top-level items that may start a chunk.
    pub fn is_top_level_item(self) -> bool {
        matches!(
            self,
            SyntaxKind::ModuleDeclaration
                | SyntaxKind::ImportClause
                | SyntaxKind::ValueDeclaration
                | SyntaxKind::TypeAnnotation
                | SyntaxKind::TypeDeclaration
                | SyntaxKind::TypeAliasDeclaration
                | SyntaxKind::PortAnnotation
                | SyntaxKind::InfixDeclaration
                | SyntaxKind::Error
        )
    }

    /// Human-readable description used in syntax error messages.
    pub fn describe(self) -> &'static str {
        match self {
            SyntaxKind::ModuleDeclaration => "module declaration",
            SyntaxKind::ImportClause => "import",
            SyntaxKind::ExposingList => "exposing list",
            SyntaxKind::ValueDeclaration => "declaration",
            SyntaxKind::FunctionDeclarationLeft => "function head",
            SyntaxKind::TypeAnnotation | SyntaxKind::PortAnnotation => "type annotation",
            SyntaxKind::TypeDeclaration => "type declaration",
            SyntaxKind::UnionVariant => "variant",
            SyntaxKind::TypeAliasDeclaration => "type alias",
            SyntaxKind::InfixDeclaration => "infix declaration",
            SyntaxKind::RecordType | SyntaxKind::FieldType => "record type",
            SyntaxKind::TypeExpression | SyntaxKind::TypeRef | SyntaxKind::TupleType => "type",
            SyntaxKind::LetIn => "let expression",
            SyntaxKind::CaseOf | SyntaxKind::CaseBranch => "case expression",
            SyntaxKind::IfElse => "if expression",
            SyntaxKind::Lambda => "anonymous function",
            SyntaxKind::Record | SyntaxKind::RecordUpdate | SyntaxKind::RecordField => "record",
            SyntaxKind::List => "list",
            SyntaxKind::Tuple | SyntaxKind::Parenthesized => "parenthesized expression",
            SyntaxKind::Call | SyntaxKind::BinOp | SyntaxKind::Negate => "expression",
            kind if kind.is_pattern() => "pattern",
            _ => "expression",
        }
    }
}

/// Map an identifier to its keyword kind, if it is reserved.
pub fn keyword(text: &str) -> Option<SyntaxKind> {
    let kind = match text {
        "module" => SyntaxKind::ModuleKw,
        "exposing" => SyntaxKind::ExposingKw,
        "import" => SyntaxKind::ImportKw,
        "as" => SyntaxKind::AsKw,
        "type" => SyntaxKind::TypeKw,
        "alias" => SyntaxKind::AliasKw,
        "port" => SyntaxKind::PortKw,
        "let" => SyntaxKind::LetKw,
        "in" => SyntaxKind::InKw,
        "case" => SyntaxKind::CaseKw,
        "of" => SyntaxKind::OfKw,
        "if" => SyntaxKind::IfKw,
        "then" => SyntaxKind::ThenKw,
        "else" => SyntaxKind::ElseKw,
        "infix" => SyntaxKind::InfixKw,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_and_node_partition() {
        assert!(SyntaxKind::LowerIdent.is_token());
        assert!(SyntaxKind::ErrorToken.is_token());
        assert!(!SyntaxKind::File.is_token());
        assert!(!SyntaxKind::Missing.is_token());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(keyword("case"), Some(SyntaxKind::CaseKw));
        assert_eq!(keyword("alias"), Some(SyntaxKind::AliasKw));
        assert_eq!(keyword("cases"), None);
        assert!(SyntaxKind::InKw.is_keyword());
        assert!(!SyntaxKind::LowerIdent.is_keyword());
    }
}
