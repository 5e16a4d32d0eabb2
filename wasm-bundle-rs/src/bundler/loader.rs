//! Filesystem module loader for the in-process bundler.
//!
//! Implements deno_graph's Loader trait over `file:` specifiers, applying the
//! configured extension-to-loader rules before a module enters the graph.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use deno_graph::source::{LoadError, LoadFuture, LoadOptions, LoadResponse, Loader};
use deno_graph::ModuleSpecifier;

use super::text::{base64_module_source, binary_module_source, text_module_source};
use crate::config::{lookup_loader, LoaderKind};

/// Serves local files to deno_graph.
pub struct FsGraphLoader {
    loaders: BTreeMap<String, LoaderKind>,
}

impl FsGraphLoader {
    pub fn new(loaders: BTreeMap<String, LoaderKind>) -> Self {
        Self { loaders }
    }

    /// Reads a module and applies its loader rule.
    ///
    /// Returns `Ok(None)` for files that do not exist so deno_graph reports
    /// them as missing modules with the importing location attached.
    fn load_module(
        &self,
        specifier: &ModuleSpecifier,
    ) -> Result<Option<(Vec<u8>, Option<&'static str>)>, io::Error> {
        if specifier.scheme() != "file" {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Only local files can be bundled, got {}", specifier),
            ));
        }
        let path = specifier.to_file_path().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Not a local file path: {}", specifier),
            )
        })?;

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        let loaded = match lookup_loader(&self.loaders, &path) {
            None => {
                if path.extension().is_some_and(|ext| ext == "wasm") {
                    log::warn!(
                        "{} has no loader rule and will be left external",
                        path.display()
                    );
                }
                (bytes, None)
            }
            Some(kind) => {
                log::debug!("Loading {} with the {} loader", path.display(), kind);
                match kind {
                    LoaderKind::Js => (bytes, Some("application/javascript")),
                    LoaderKind::Ts => (bytes, Some("application/typescript")),
                    LoaderKind::Json => (bytes, Some("application/json")),
                    LoaderKind::Text => {
                        let text = String::from_utf8(bytes).map_err(|err| {
                            io::Error::new(
                                io::ErrorKind::InvalidData,
                                format!("{} is not valid UTF-8: {}", path.display(), err),
                            )
                        })?;
                        (
                            text_module_source(&text).into_bytes(),
                            Some("application/javascript"),
                        )
                    }
                    LoaderKind::Base64 => (
                        base64_module_source(&bytes).into_bytes(),
                        Some("application/javascript"),
                    ),
                    LoaderKind::Binary => (
                        binary_module_source(&bytes).into_bytes(),
                        Some("application/javascript"),
                    ),
                }
            }
        };
        Ok(Some(loaded))
    }
}

impl Loader for FsGraphLoader {
    fn load(&self, specifier: &ModuleSpecifier, _options: LoadOptions) -> LoadFuture {
        let specifier = specifier.clone();
        let result = self.load_module(&specifier);

        Box::pin(async move {
            match result {
                Ok(Some((content, content_type))) => {
                    // An explicit content type overrides the extension-based media type
                    let maybe_headers = content_type.map(|content_type| {
                        HashMap::from([("content-type".to_string(), content_type.to_string())])
                    });

                    Ok(Some(LoadResponse::Module {
                        specifier,
                        maybe_headers,
                        content: Arc::from(content),
                        mtime: None,
                    }))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(LoadError::Other(Arc::new(e))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_loaders;
    use std::fs;

    #[test]
    fn test_binary_rule_turns_wasm_into_module() {
        let dir = tempfile::tempdir().unwrap();
        let wasm = dir.path().join("engine_bg.wasm");
        fs::write(&wasm, b"\0asm\x01\0\0\0").unwrap();

        let loader = FsGraphLoader::new(default_loaders());
        let specifier = ModuleSpecifier::from_file_path(&wasm).unwrap();
        let (content, content_type) = loader.load_module(&specifier).unwrap().unwrap();
        let content = String::from_utf8(content).unwrap();

        assert_eq!(content_type, Some("application/javascript"));
        assert!(content.contains("AGFzbQEAAAA="), "{content}");
    }

    #[test]
    fn test_unmapped_files_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("index.ts");
        fs::write(&entry, "export const x: number = 1;\n").unwrap();

        let loader = FsGraphLoader::new(default_loaders());
        let specifier = ModuleSpecifier::from_file_path(&entry).unwrap();
        let (content, content_type) = loader.load_module(&specifier).unwrap().unwrap();

        assert_eq!(content_type, None);
        assert_eq!(content, b"export const x: number = 1;\n");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsGraphLoader::new(default_loaders());
        let specifier = ModuleSpecifier::from_file_path(dir.path().join("missing.js")).unwrap();
        assert!(loader.load_module(&specifier).unwrap().is_none());
    }

    #[test]
    fn test_remote_specifiers_are_rejected() {
        let loader = FsGraphLoader::new(default_loaders());
        let specifier = ModuleSpecifier::parse("https://example.com/mod.js").unwrap();
        let err = loader.load_module(&specifier).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_text_rule_requires_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("moves.txt");
        fs::write(&file, [0xff, 0xfe, 0x00]).unwrap();

        let loader = FsGraphLoader::new(BTreeMap::from([(".txt".to_string(), LoaderKind::Text)]));
        let specifier = ModuleSpecifier::from_file_path(&file).unwrap();
        let err = loader.load_module(&specifier).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
