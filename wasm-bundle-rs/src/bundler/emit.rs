//! In-process bundling on top of deno_graph and the SWC bundler in deno_ast.
//!
//! The module graph is built first, so every import is resolved and loaded
//! before SWC runs. The SWC side only reads from the finished graph:
//! TypeScript is lowered to JavaScript with deno_ast, the result is parsed
//! into an SWC module, and the bundled module is printed as ES2022.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, bail};
use deno_ast::swc::ast::{EsVersion, Module as SwcModule};
use deno_ast::swc::bundler::{
    Bundler, Config as BundlerConfig, Load, ModuleData, ModuleType, Resolve,
};
use deno_ast::swc::codegen::text_writer::JsWriter;
use deno_ast::swc::codegen::{Config as CodegenConfig, Emitter};
use deno_ast::swc::common::comments::SingleThreadedComments;
use deno_ast::swc::common::sync::Lrc;
use deno_ast::swc::common::{FileName, Globals, SourceFile, SourceMap, GLOBALS};
use deno_ast::swc::loader::resolve::Resolution;
use deno_ast::swc::parser::lexer::Lexer;
use deno_ast::swc::parser::{EsSyntax, Parser, StringInput, Syntax};
use deno_ast::MediaType;
use deno_graph::{BuildOptions, GraphKind, Module, ModuleGraph, ModuleSpecifier};

use super::bundle_hook::ForwardImportMeta;
use super::loader::FsGraphLoader;
use super::text::{strip_bom, transform_json_source};
use crate::config::OutputFormat;

const TARGET: EsVersion = EsVersion::Es2022;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitOptions {
    pub format: OutputFormat,
    pub minify: bool,
}

#[derive(Debug)]
pub struct BundleEmit {
    pub code: String,
}

impl From<OutputFormat> for ModuleType {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Esm => ModuleType::Es,
            OutputFormat::Iife => ModuleType::Iife,
        }
    }
}

/// Loads everything reachable from `entry` and bundles it into one module.
pub async fn bundle(
    entry: ModuleSpecifier,
    loader: &FsGraphLoader,
    options: EmitOptions,
) -> Result<BundleEmit, anyhow::Error> {
    let graph = build_graph(entry, loader).await?;
    bundle_graph(&graph, options)
}

async fn build_graph(
    entry: ModuleSpecifier,
    loader: &FsGraphLoader,
) -> Result<ModuleGraph, anyhow::Error> {
    let mut graph = ModuleGraph::new(GraphKind::CodeOnly);
    graph
        .build(vec![entry], Vec::new(), loader, BuildOptions::default())
        .await;
    // Missing files and unresolvable imports are recorded on the graph
    graph.valid()?;
    log::debug!("Module graph has {} modules", graph.modules().count());
    Ok(graph)
}

/// Bundles a graph that has already been built and validated.
pub fn bundle_graph(graph: &ModuleGraph, options: EmitOptions) -> Result<BundleEmit, anyhow::Error> {
    let Some(root) = graph.roots.first() else {
        bail!("Module graph has no root");
    };

    let globals = Globals::new();
    GLOBALS.set(&globals, || {
        let source_map: Lrc<SourceMap> = Default::default();

        // Only local code is inlined. An unmapped .wasm stays an import.
        let external_modules = graph
            .modules()
            .filter(|module| !matches!(module, Module::Js(_) | Module::Json(_)))
            .map(|module| module.specifier().as_str().into())
            .collect();

        let mut bundler = Bundler::new(
            &globals,
            source_map.clone(),
            GraphModules {
                graph,
                source_map: source_map.clone(),
            },
            GraphResolutions { graph },
            BundlerConfig {
                module: options.format.into(),
                external_modules,
                ..Default::default()
            },
            Box::new(ForwardImportMeta),
        );

        let entries = HashMap::from([("main".to_string(), FileName::Url(root.clone()))]);
        let mut bundles = bundler.bundle(entries)?;
        if bundles.is_empty() {
            bail!("SWC produced no bundle for {}", root);
        }
        let bundled = bundles.swap_remove(0);

        let code = print_module(&source_map, &bundled.module, options.minify)?;
        Ok(BundleEmit { code })
    })
}

fn print_module(
    source_map: &Lrc<SourceMap>,
    module: &SwcModule,
    minify: bool,
) -> Result<String, anyhow::Error> {
    let mut out = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default()
                .with_minify(minify)
                .with_target(TARGET)
                .with_omit_last_semi(false),
            cm: source_map.clone(),
            comments: None,
            wr: Box::new(JsWriter::new(source_map.clone(), "\n", &mut out, None)),
        };
        emitter.emit_module(module)?;
    }
    Ok(String::from_utf8(out)?)
}

/// Serves SWC the module sources already held by the graph.
struct GraphModules<'a> {
    graph: &'a ModuleGraph,
    source_map: Lrc<SourceMap>,
}

impl Load for GraphModules<'_> {
    fn load(&self, file: &FileName) -> Result<ModuleData, anyhow::Error> {
        let specifier = url_of(file)?;
        let (text, media_type) = module_text(self.graph, specifier)?;
        let (fm, module) = parse_module(specifier, text, media_type, &self.source_map)?;
        Ok(ModuleData {
            fm,
            module,
            helpers: Default::default(),
        })
    }
}

/// Answers SWC's import resolution with the graph's own resolution.
struct GraphResolutions<'a> {
    graph: &'a ModuleGraph,
}

impl Resolve for GraphResolutions<'_> {
    fn resolve(&self, base: &FileName, module_specifier: &str) -> Result<Resolution, anyhow::Error> {
        let referrer = url_of(base)?;
        let Some(resolved) = self
            .graph
            .resolve_dependency(module_specifier, referrer, false)
        else {
            bail!(
                "Unable to resolve {} imported from {}",
                module_specifier,
                referrer
            );
        };
        Ok(Resolution {
            filename: FileName::Url(resolved.clone()),
            slug: None,
        })
    }
}

fn url_of(file: &FileName) -> Result<&ModuleSpecifier, anyhow::Error> {
    match file {
        FileName::Url(url) => Ok(url),
        other => Err(anyhow!("Expected a URL module name, got {:?}", other)),
    }
}

fn module_text<'g>(
    graph: &'g ModuleGraph,
    specifier: &ModuleSpecifier,
) -> Result<(&'g str, MediaType), anyhow::Error> {
    match graph.get(specifier) {
        Some(Module::Js(js)) => Ok((&*js.source.text, js.media_type)),
        Some(Module::Json(json)) => Ok((&*json.source.text, json.media_type)),
        Some(Module::Wasm(_)) => bail!(
            "{} is WebAssembly; add a loader rule such as .wasm=binary to embed it",
            specifier
        ),
        Some(_) => bail!("{} is not a local module and cannot be inlined", specifier),
        None => bail!("{} is not part of the module graph", specifier),
    }
}

/// Whether deno_ast has to lower the module before SWC sees it.
fn needs_type_stripping(media_type: MediaType) -> bool {
    matches!(
        media_type,
        MediaType::TypeScript
            | MediaType::Mts
            | MediaType::Cts
            | MediaType::Tsx
            | MediaType::Jsx
    )
}

/// Strips types (and lowers JSX) with deno_ast, yielding plain JavaScript.
fn strip_types(
    specifier: &ModuleSpecifier,
    source: String,
    media_type: MediaType,
) -> Result<String, anyhow::Error> {
    let parsed = deno_ast::parse_module(deno_ast::ParseParams {
        specifier: specifier.clone(),
        text: source.into(),
        media_type,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    })?;
    let emitted = parsed.transpile(
        &deno_ast::TranspileOptions::default(),
        &deno_ast::TranspileModuleOptions::default(),
        &deno_ast::EmitOptions {
            source_map: deno_ast::SourceMapOption::None,
            ..Default::default()
        },
    )?;
    Ok(emitted.into_source().text)
}

/// JavaScript text for a graph module of the given media type.
fn to_javascript(
    specifier: &ModuleSpecifier,
    text: &str,
    media_type: MediaType,
) -> Result<String, anyhow::Error> {
    let text = strip_bom(text);
    match media_type {
        MediaType::Json => Ok(transform_json_source(text)),
        MediaType::Dts | MediaType::Dmts | MediaType::Dcts => {
            bail!("Declaration file {} cannot be bundled", specifier)
        }
        media_type if needs_type_stripping(media_type) => {
            log::debug!("Stripping types from {}", specifier);
            strip_types(specifier, text.to_string(), media_type)
        }
        _ => Ok(text.to_string()),
    }
}

fn parse_module(
    specifier: &ModuleSpecifier,
    text: &str,
    media_type: MediaType,
    source_map: &Lrc<SourceMap>,
) -> Result<(Rc<SourceFile>, SwcModule), anyhow::Error> {
    let code = to_javascript(specifier, text, media_type)?;
    let fm = source_map.new_source_file(FileName::Url(specifier.clone()).into(), code);

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        TARGET,
        StringInput::from(&*fm),
        Some(&comments),
    );
    let module = Parser::new_from(lexer)
        .parse_module()
        .map_err(|err| anyhow!("Unable to parse {}: {:?}", specifier, err))?;

    Ok((Rc::new((*fm).clone()), module))
}
