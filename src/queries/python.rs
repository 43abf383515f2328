use tree_sitter::Language;

pub fn language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// Definitions query: classes with their superclass list, methods inside a
/// class body (plain and decorated), and module-level functions (plain and
/// decorated). Nested functions are intentionally not captured.
pub const DEFINITIONS_QUERY: &str = r#"
;; Class definitions with their full body
(class_definition
    name: (identifier) @class.name
    (argument_list
        (identifier) @class.superclass)?
    body: (block) @class.body)

;; Method definitions inside a class body
(class_definition
    body: (block
        (function_definition
            name: (identifier) @method.name
            parameters: (parameters) @method.params
            return_type: (type)? @method.return_type
            body: (_) @method.body)))

;; Method definitions behind decorators
(class_definition
    body: (block
        (decorated_definition
            (decorator)*
            definition: (function_definition
                name: (identifier) @method.name
                parameters: (parameters) @method.params
                return_type: (type)? @method.return_type
                body: (_) @method.body))))

;; Module-level functions
(module
    (function_definition
        name: (identifier) @function.name
        parameters: (parameters) @function.params
        return_type: (type)? @function.return_type
        body: (_) @function.body))

;; Module-level functions behind decorators
(module
    (decorated_definition
        (decorator)*
        definition: (function_definition
            name: (identifier) @function.name
            parameters: (parameters) @function.params
            return_type: (type)? @function.return_type
            body: (_) @function.body)))
"#;

/// Imports query: the four Python import shapes.
pub const IMPORTS_QUERY: &str = r#"
;; import pandas
(import_statement
    name: (dotted_name) @module)

;; import pandas as pd
(import_statement
    name: (aliased_import
        name: (dotted_name) @module
        alias: (identifier) @alias))

;; from module import single_name
(import_from_statement
    module_name: (dotted_name) @module
    name: (dotted_name) @imported_name)

;; from module import name as alias
(import_from_statement
    module_name: (dotted_name) @module
    name: (aliased_import
        name: (dotted_name) @imported_name
        alias: (identifier) @alias))
"#;

crate::decl_indices!(DefinitionIndices, {
    class_name => "class.name",
    class_superclass => "class.superclass",
    class_body => "class.body",
    method_name => "method.name",
    method_params => "method.params",
    method_return_type => "method.return_type",
    method_body => "method.body",
    function_name => "function.name",
    function_params => "function.params",
    function_return_type => "function.return_type",
    function_body => "function.body",
});

crate::decl_indices!(ImportIndices, {
    module => "module",
    alias => "alias",
    imported_name => "imported_name",
});
