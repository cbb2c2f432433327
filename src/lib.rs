pub mod accessor;
pub mod ast;
pub mod codec;
pub mod compiler;
pub mod config;
pub mod crud;
pub mod engine;
pub mod error;
pub mod inflect;
pub mod linker;
pub mod marker;
pub mod registry;
pub mod serializer;
pub mod types;
pub mod walker;

use wasm_bindgen::prelude::*;

pub use ast::CompiledSchema;
pub use compiler::{Compiler, compile, emit};
pub use config::CompileOptions;
pub use error::CompileError;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn compile_source(source: &str, options: Option<String>) -> Result<CompiledSchema, String> {
    let options = match options.as_deref() {
        Some(json) => serde_json::from_str(json).map_err(|e| e.to_string())?,
        None => CompileOptions::default(),
    };
    Compiler::new(options)
        .compile_str(source)
        .map_err(|e| e.to_string())
}

/// Compile a schema document to the JSON rendering of the compiled schema.
/// `options` is a JSON object of compile options.
#[wasm_bindgen(js_name = "compileSchema")]
pub fn compile_schema(source: &str, options: Option<String>) -> Result<String, String> {
    let schema = compile_source(source, options)?;
    serializer::to_json(&schema).map_err(|e| e.to_string())
}

/// Like [`compile_schema`], parsed into a JS object.
#[wasm_bindgen(js_name = "compileSchemaObject")]
pub fn compile_schema_object(source: &str, options: Option<String>) -> Result<JsValue, JsValue> {
    let json = compile_schema(source, options).map_err(|e| JsValue::from_str(&e))?;
    js_sys::JSON::parse(&json)
}

/// Compile a schema document to the text report.
#[wasm_bindgen(js_name = "describeSchema")]
pub fn describe_schema(source: &str, options: Option<String>) -> Result<String, String> {
    let schema = compile_source(source, options)?;
    Ok(serializer::serialize(&schema))
}
