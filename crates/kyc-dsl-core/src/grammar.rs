//! Canonical DSL grammar.
//!
//! The EBNF is versioned in the `kyc_grammars` table; the server inserts
//! this text at bootstrap when the row is absent. Validation references the
//! grammar version in its audit trail.

pub const GRAMMAR_NAME: &str = "kyc-dsl";
pub const GRAMMAR_VERSION: &str = "1.1";

const GRAMMAR_EBNF: &str = r#"DSL            = { KycCase } ;
KycCase        = "(" "kyc-case" Identifier { Section } ")" ;
Section        = NaturePurpose | ClientBusinessUnit | Function | Policy
               | Obligation | KycToken | OwnershipStructure
               | DataDictionary | DocumentRequirements ;
NaturePurpose  = "(" "nature-purpose" "(" "nature" Quoted ")"
                                      "(" "purpose" Quoted ")" ")" ;
ClientBusinessUnit = "(" "client-business-unit" Identifier ")" ;
Function       = "(" "function" Identifier ")" ;
Policy         = "(" "policy" Identifier ")" ;
Obligation     = "(" "obligation" Identifier ")" ;
KycToken       = "(" "kyc-token" Quoted ")" ;
OwnershipStructure = "(" "ownership-structure"
                     { Owner | BeneficialOwner | Controller | Entity } ")" ;
Owner           = "(" "owner" Identifier Percent ")" ;
BeneficialOwner = "(" "beneficial-owner" Identifier Percent ")" ;
Controller      = "(" "controller" Identifier Quoted ")" ;
Entity          = "(" "entity" Identifier ")" ;
Percent         = Number [ "%" ] ;
Identifier      = ( Letter | Digit | "-" | "_" )+ ;
Quoted          = '"' { Char - '"' } '"' ;
"#;

/// The canonical grammar text for the current version.
pub fn current_grammar_ebnf() -> &'static str {
    GRAMMAR_EBNF
}
