/*!
 Recursive descent parser for MOF text.

 The parser only checks syntax. Names are resolved and values are typed against their declarations
 when the declarations are compiled, since that needs the classes seen so far.
*/

use crate::{
    error::mof::MofError,
    mof::{
        models::{CimType, Flavor},
        text::lexer::{Lexer, Spanned, Token},
    },
};

/// A qualifier as written: `Name`, `Name(value)`, or `Name{values}`, with optional flavors
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QualifierSyntax {
    pub(crate) name: String,
    pub(crate) value: Option<ValueSyntax>,
    /// Flavors written after a `:`, empty when none were
    pub(crate) flavor: Flavor,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueSyntax {
    Null,
    Boolean(bool),
    Integer(i128),
    Real(f64),
    /// Adjacent string literals are already joined
    String(String),
    Char(u16),
    Alias(String),
    Array(Vec<ValueSyntax>),
    Instance(Box<InstanceSyntax>),
}

impl ValueSyntax {
    /// How the value reads in an error message
    pub(crate) fn describe(&self) -> String {
        match self {
            ValueSyntax::Null => "null".to_string(),
            ValueSyntax::Boolean(flag) => format!("`{flag}`"),
            ValueSyntax::Integer(value) => format!("integer `{value}`"),
            ValueSyntax::Real(value) => format!("real `{value}`"),
            ValueSyntax::String(_) => "a string".to_string(),
            ValueSyntax::Char(_) => "a character".to_string(),
            ValueSyntax::Alias(alias) => format!("alias `${alias}`"),
            ValueSyntax::Array(_) => "an array".to_string(),
            ValueSyntax::Instance(instance) => format!("an instance of `{}`", instance.class_name),
        }
    }
}

/// The type written before a property, parameter, or method name
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DataType {
    Scalar(CimType),
    /// `ClassName REF`
    Reference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropertySyntax {
    pub(crate) qualifiers: Vec<QualifierSyntax>,
    pub(crate) data_type: DataType,
    pub(crate) name: String,
    pub(crate) array: bool,
    pub(crate) default: Option<ValueSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParameterSyntax {
    pub(crate) qualifiers: Vec<QualifierSyntax>,
    pub(crate) data_type: DataType,
    pub(crate) name: String,
    pub(crate) array: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MethodSyntax {
    pub(crate) qualifiers: Vec<QualifierSyntax>,
    pub(crate) return_type: DataType,
    pub(crate) name: String,
    pub(crate) parameters: Vec<ParameterSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassSyntax {
    pub(crate) qualifiers: Vec<QualifierSyntax>,
    pub(crate) name: String,
    pub(crate) superclass: Option<String>,
    pub(crate) properties: Vec<PropertySyntax>,
    pub(crate) methods: Vec<MethodSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AssignmentSyntax {
    pub(crate) name: String,
    pub(crate) value: ValueSyntax,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InstanceSyntax {
    pub(crate) class_name: String,
    pub(crate) alias: Option<String>,
    pub(crate) properties: Vec<AssignmentSyntax>,
}

/// `Qualifier Name : type = default, Scope(...), Flavor(...);`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QualifierTypeSyntax {
    pub(crate) name: String,
    pub(crate) cim_type: CimType,
    pub(crate) default: Option<ValueSyntax>,
    pub(crate) flavor: Flavor,
}

/// A top-level production
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Declaration {
    Class(ClassSyntax),
    Instance(InstanceSyntax),
    /// `#pragma name("value")`; only the first argument is kept
    Pragma { name: String, value: String },
    QualifierType(QualifierTypeSyntax),
}

/// The CIM type named by a type keyword
fn scalar_type(keyword: &str) -> Option<CimType> {
    let cim_type = match keyword.to_ascii_lowercase().as_str() {
        "boolean" => CimType::Boolean,
        "uint8" => CimType::UInt8,
        "sint8" => CimType::SInt8,
        "uint16" => CimType::UInt16,
        "sint16" => CimType::SInt16,
        "uint32" => CimType::UInt32,
        "sint32" => CimType::SInt32,
        "uint64" => CimType::UInt64,
        "sint64" => CimType::SInt64,
        "real32" => CimType::Real32,
        "real64" => CimType::Real64,
        "char16" => CimType::Char16,
        "datetime" => CimType::DateTime,
        "string" => CimType::String,
        "object" => CimType::Instance,
        _ => return None,
    };
    Some(cim_type)
}

fn flavor_keyword(keyword: &str) -> Option<Flavor> {
    let flavor = match keyword.to_ascii_lowercase().as_str() {
        "enableoverride" => Flavor::ENABLE_OVERRIDE,
        "disableoverride" => Flavor::DISABLE_OVERRIDE,
        "restricted" => Flavor::RESTRICTED,
        "tosubclass" => Flavor::TO_SUBCLASS,
        "translatable" => Flavor::TRANSLATABLE,
        _ => return None,
    };
    Some(flavor)
}

/// Parses declarations from MOF text, reading tokens only as they are needed
pub(crate) struct Parser<'s> {
    lexer: Lexer<'s>,
    current: Option<Spanned>,
    consumed: usize,
    /// How many embedded instances may enclose a value
    max_depth: usize,
    depth: usize,
}

impl<'s> Parser<'s> {
    pub(crate) fn new(text: &'s str, max_depth: usize) -> Self {
        Self {
            lexer: Lexer::new(text),
            current: None,
            consumed: 0,
            max_depth,
            depth: 0,
        }
    }

    /// Byte position just past the last token consumed
    pub(crate) fn consumed(&self) -> usize {
        self.consumed
    }

    fn peek(&mut self) -> Result<&Spanned, MofError> {
        let spanned = match self.current.take() {
            Some(spanned) => spanned,
            None => self.lexer.next_token()?,
        };
        Ok(self.current.insert(spanned))
    }

    fn advance(&mut self) -> Result<Spanned, MofError> {
        let spanned = match self.current.take() {
            Some(spanned) => spanned,
            None => self.lexer.next_token()?,
        };
        self.consumed = spanned.end;
        Ok(spanned)
    }

    fn check(&mut self, token: &Token) -> Result<bool, MofError> {
        Ok(&self.peek()?.token == token)
    }

    fn eat(&mut self, token: &Token) -> Result<bool, MofError> {
        if self.check(token)? {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn is_keyword(&mut self, keyword: &str) -> Result<bool, MofError> {
        Ok(matches!(
            &self.peek()?.token,
            Token::Identifier(word) if word.eq_ignore_ascii_case(keyword)
        ))
    }

    fn eat_keyword(&mut self, keyword: &str) -> Result<bool, MofError> {
        if self.is_keyword(keyword)? {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// An error for the next token, which is not `expected`
    fn unexpected(&mut self, expected: &str) -> MofError {
        let (start, found) = match self.peek() {
            Ok(spanned) => (spanned.start, spanned.token.describe()),
            Err(why) => return why,
        };
        self.lexer
            .error_at(start, format!("expected {expected}, found {found}"))
    }

    fn expect(&mut self, token: Token) -> Result<(), MofError> {
        if self.eat(&token)? {
            return Ok(());
        }
        Err(self.unexpected(&token.describe()))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), MofError> {
        if self.eat_keyword(keyword)? {
            return Ok(());
        }
        Err(self.unexpected(&format!("`{keyword}`")))
    }

    fn identifier(&mut self, what: &str) -> Result<String, MofError> {
        let name = match &self.peek()?.token {
            Token::Identifier(name) => name.clone(),
            _ => return Err(self.unexpected(what)),
        };
        self.advance()?;
        Ok(name)
    }

    /// One or more adjacent string literals, joined
    fn string(&mut self, what: &str) -> Result<String, MofError> {
        let mut text = match &self.peek()?.token {
            Token::String(text) => text.clone(),
            _ => return Err(self.unexpected(what)),
        };
        self.advance()?;
        while let Token::String(more) = &self.peek()?.token {
            text.push_str(more);
            self.advance()?;
        }
        Ok(text)
    }

    /// Parse the next top-level declaration, or `None` at the end of the text
    pub(crate) fn next_declaration(&mut self) -> Result<Option<Declaration>, MofError> {
        while self.eat(&Token::Semicolon)? {}
        if self.check(&Token::Eof)? {
            return Ok(None);
        }
        if self.eat(&Token::Hash)? {
            return self.pragma().map(Some);
        }
        if self.eat_keyword("qualifier")? {
            return self.qualifier_type().map(Some);
        }

        let qualifiers = self.qualifier_list()?;
        let declaration = if self.eat_keyword("class")? {
            Declaration::Class(self.class(qualifiers)?)
        } else if self.is_keyword("instance")? {
            Declaration::Instance(self.instance()?)
        } else {
            return Err(self.unexpected("`class`, `instance`, `qualifier`, or `#pragma`"));
        };
        self.expect(Token::Semicolon)?;
        Ok(Some(declaration))
    }

    fn pragma(&mut self) -> Result<Declaration, MofError> {
        self.expect_keyword("pragma")?;
        let name = self.identifier("a pragma name")?;
        self.expect(Token::OpenParen)?;

        let mut value = None;
        loop {
            let argument = match &self.peek()?.token {
                Token::String(_) => self.string("a pragma argument")?,
                Token::Identifier(word) => {
                    let word = word.clone();
                    self.advance()?;
                    word
                }
                _ => return Err(self.unexpected("a pragma argument")),
            };
            if value.is_none() {
                value = Some(argument);
            }
            if !self.eat(&Token::Comma)? {
                break;
            }
        }
        self.expect(Token::CloseParen)?;

        Ok(Declaration::Pragma {
            name,
            value: value.unwrap_or_default(),
        })
    }

    fn qualifier_type(&mut self) -> Result<Declaration, MofError> {
        let name = self.identifier("a qualifier name")?;
        self.expect(Token::Colon)?;
        let mut cim_type = self.scalar_type()?;
        if self.array_suffix()? {
            cim_type = cim_type.array_type();
        }
        let default = if self.eat(&Token::Equals)? {
            Some(self.value()?)
        } else {
            None
        };

        let mut flavor = Flavor::empty();
        while self.eat(&Token::Comma)? {
            if self.eat_keyword("scope")? {
                // Scopes restrict where a qualifier may appear, which is not enforced
                self.expect(Token::OpenParen)?;
                loop {
                    self.identifier("a scope")?;
                    if !self.eat(&Token::Comma)? {
                        break;
                    }
                }
                self.expect(Token::CloseParen)?;
            } else if self.eat_keyword("flavor")? {
                self.expect(Token::OpenParen)?;
                loop {
                    flavor |= self.flavor()?;
                    if !self.eat(&Token::Comma)? {
                        break;
                    }
                }
                self.expect(Token::CloseParen)?;
            } else {
                return Err(self.unexpected("`Scope` or `Flavor`"));
            }
        }
        self.expect(Token::Semicolon)?;

        Ok(Declaration::QualifierType(QualifierTypeSyntax {
            name,
            cim_type,
            default,
            flavor,
        }))
    }

    fn flavor(&mut self) -> Result<Flavor, MofError> {
        let flavor = match &self.peek()?.token {
            Token::Identifier(word) => flavor_keyword(word),
            _ => None,
        };
        match flavor {
            Some(flavor) => {
                self.advance()?;
                Ok(flavor)
            }
            None => Err(self.unexpected("a flavor")),
        }
    }

    fn scalar_type(&mut self) -> Result<CimType, MofError> {
        let cim_type = match &self.peek()?.token {
            Token::Identifier(word) => scalar_type(word),
            _ => None,
        };
        match cim_type {
            Some(cim_type) => {
                self.advance()?;
                Ok(cim_type)
            }
            None => Err(self.unexpected("a type")),
        }
    }

    /// `[Name, Name(value), ...]`, or nothing
    fn qualifier_list(&mut self) -> Result<Vec<QualifierSyntax>, MofError> {
        let mut qualifiers = vec![];
        if !self.eat(&Token::OpenBracket)? {
            return Ok(qualifiers);
        }
        loop {
            qualifiers.push(self.qualifier()?);
            if self.eat(&Token::CloseBracket)? {
                return Ok(qualifiers);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn qualifier(&mut self) -> Result<QualifierSyntax, MofError> {
        let name = self.identifier("a qualifier name")?;
        let value = if self.eat(&Token::OpenParen)? {
            let value = self.value()?;
            self.expect(Token::CloseParen)?;
            Some(value)
        } else if self.check(&Token::OpenBrace)? {
            Some(self.array()?)
        } else {
            None
        };

        let mut flavor = Flavor::empty();
        if self.eat(&Token::Colon)? {
            flavor |= self.flavor()?;
            while let Token::Identifier(word) = &self.peek()?.token {
                let Some(more) = flavor_keyword(word) else {
                    break;
                };
                flavor |= more;
                self.advance()?;
            }
        }

        Ok(QualifierSyntax {
            name,
            value,
            flavor,
        })
    }

    fn class(&mut self, qualifiers: Vec<QualifierSyntax>) -> Result<ClassSyntax, MofError> {
        let name = self.identifier("a class name")?;
        let superclass = if self.eat(&Token::Colon)? {
            Some(self.identifier("a superclass name")?)
        } else {
            None
        };
        self.expect(Token::OpenBrace)?;

        let mut properties = vec![];
        let mut methods = vec![];
        while !self.eat(&Token::CloseBrace)? {
            let qualifiers = self.qualifier_list()?;
            let data_type = self.data_type()?;
            let name = self.identifier("a property or method name")?;
            if self.eat(&Token::OpenParen)? {
                methods.push(MethodSyntax {
                    qualifiers,
                    return_type: data_type,
                    name,
                    parameters: self.parameters()?,
                });
            } else {
                let array = self.array_suffix()?;
                let default = if self.eat(&Token::Equals)? {
                    Some(self.value()?)
                } else {
                    None
                };
                properties.push(PropertySyntax {
                    qualifiers,
                    data_type,
                    name,
                    array,
                    default,
                });
            }
            self.expect(Token::Semicolon)?;
        }

        Ok(ClassSyntax {
            qualifiers,
            name,
            superclass,
            properties,
            methods,
        })
    }

    /// A type keyword, or a class name followed by `REF`
    fn data_type(&mut self) -> Result<DataType, MofError> {
        let word = match &self.peek()?.token {
            Token::Identifier(word) => word.clone(),
            _ => return Err(self.unexpected("a type")),
        };
        self.advance()?;
        if let Some(cim_type) = scalar_type(&word) {
            return Ok(DataType::Scalar(cim_type));
        }
        if self.eat_keyword("ref")? {
            return Ok(DataType::Reference(word));
        }
        Err(self.unexpected(&format!("`ref` after class name `{word}`")))
    }

    /// The parameter list of a method, after its `(`
    fn parameters(&mut self) -> Result<Vec<ParameterSyntax>, MofError> {
        let mut parameters = vec![];
        if self.eat(&Token::CloseParen)? {
            return Ok(parameters);
        }
        loop {
            let qualifiers = self.qualifier_list()?;
            let data_type = self.data_type()?;
            let name = self.identifier("a parameter name")?;
            let array = self.array_suffix()?;
            // Parameter defaults are allowed by the grammar but carry no meaning in a declaration
            if self.eat(&Token::Equals)? {
                self.value()?;
            }
            parameters.push(ParameterSyntax {
                qualifiers,
                data_type,
                name,
                array,
            });
            if self.eat(&Token::CloseParen)? {
                return Ok(parameters);
            }
            self.expect(Token::Comma)?;
        }
    }

    /// `[]` or `[N]`; the size of a fixed-size array is not kept
    fn array_suffix(&mut self) -> Result<bool, MofError> {
        if !self.eat(&Token::OpenBracket)? {
            return Ok(false);
        }
        if let Token::Integer(_) = self.peek()?.token {
            self.advance()?;
        }
        self.expect(Token::CloseBracket)?;
        Ok(true)
    }

    /// `instance of Class [as $alias] { name = value; ... }`, without a trailing `;`
    fn instance(&mut self) -> Result<InstanceSyntax, MofError> {
        self.expect_keyword("instance")?;
        self.expect_keyword("of")?;
        let class_name = self.identifier("a class name")?;
        let alias = if self.eat_keyword("as")? {
            let alias = match &self.peek()?.token {
                Token::Alias(alias) => alias.clone(),
                _ => return Err(self.unexpected("an alias")),
            };
            self.advance()?;
            Some(alias)
        } else {
            None
        };

        self.expect(Token::OpenBrace)?;
        let mut properties = vec![];
        while !self.eat(&Token::CloseBrace)? {
            // Qualifiers on property values do not change the value
            self.qualifier_list()?;
            let name = self.identifier("a property name")?;
            self.expect(Token::Equals)?;
            let value = self.value()?;
            self.expect(Token::Semicolon)?;
            properties.push(AssignmentSyntax { name, value });
        }

        Ok(InstanceSyntax {
            class_name,
            alias,
            properties,
        })
    }

    fn value(&mut self) -> Result<ValueSyntax, MofError> {
        let value = match &self.peek()?.token {
            Token::OpenBrace => return self.array(),
            Token::String(_) => return self.string("a string").map(ValueSyntax::String),
            Token::Identifier(word) if word.eq_ignore_ascii_case("instance") => {
                if self.depth >= self.max_depth {
                    return Err(MofError::NestingTooDeep(self.max_depth));
                }
                self.depth += 1;
                let instance = self.instance();
                self.depth -= 1;
                return Ok(ValueSyntax::Instance(Box::new(instance?)));
            }
            Token::Identifier(word) if word.eq_ignore_ascii_case("null") => ValueSyntax::Null,
            Token::Identifier(word) if word.eq_ignore_ascii_case("true") => {
                ValueSyntax::Boolean(true)
            }
            Token::Identifier(word) if word.eq_ignore_ascii_case("false") => {
                ValueSyntax::Boolean(false)
            }
            Token::Integer(value) => ValueSyntax::Integer(*value),
            Token::Real(value) => ValueSyntax::Real(*value),
            Token::Char(unit) => ValueSyntax::Char(*unit),
            Token::Alias(alias) => ValueSyntax::Alias(alias.clone()),
            _ => return Err(self.unexpected("a value")),
        };
        self.advance()?;
        Ok(value)
    }

    fn array(&mut self) -> Result<ValueSyntax, MofError> {
        self.expect(Token::OpenBrace)?;
        let mut items = vec![];
        if self.eat(&Token::CloseBrace)? {
            return Ok(ValueSyntax::Array(items));
        }
        loop {
            if self.check(&Token::OpenBrace)? {
                return Err(self.unexpected("an array element"));
            }
            items.push(self.value()?);
            if self.eat(&Token::CloseBrace)? {
                return Ok(ValueSyntax::Array(items));
            }
            self.expect(Token::Comma)?;
        }
    }
}
