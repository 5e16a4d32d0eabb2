use std::fs;
use std::path::Path;

use base64::Engine;
use wasm_bundle_rs::config::Banner;
use wasm_bundle_rs::{BundleConfig, Bundler, PackageConfig, SwcBundler};

const WASM_BYTES: &[u8] = b"\0asm\x01\0\0\0";

fn write(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn config_for(root: &Path, entry: &str) -> BundleConfig {
    let mut config = PackageConfig {
        entry_point: entry.into(),
        ..Default::default()
    }
    .resolve(root)
    .bundle_config("v1.2.3");
    fs::create_dir_all(&config.outdir).unwrap();
    config.banner = Banner::generated_from("twsearch", "v1.2.3");
    config
}

#[tokio::test]
async fn test_bundles_typescript_entry_with_embedded_wasm() {
    let root = tempfile::tempdir().unwrap();
    write(
        &root.path().join("src/wasm-package/engine_bg.wasm"),
        WASM_BYTES,
    );
    write(
        &root.path().join("src/wasm-package/describe.ts"),
        b"export function describe(bytes: Uint8Array): string {\n  return `${bytes.length} bytes`;\n}\n",
    );
    write(
        &root.path().join("src/wasm-package/index.ts"),
        b"import wasm from \"./engine_bg.wasm\";\nimport { describe } from \"./describe.ts\";\n\nexport const wasmSize: number = wasm.length;\nexport const summary: string = describe(wasm);\n",
    );

    let config = config_for(root.path(), "src/wasm-package/index.ts");
    let output = SwcBundler.bundle(&config).await.unwrap();

    assert_eq!(output.files.len(), 1);
    let bundle_path = root.path().join("dist/wasm/index.js");
    assert_eq!(output.files[0].path, bundle_path);

    let code = fs::read_to_string(&bundle_path).unwrap();
    assert!(
        code.starts_with("// Generated from `twsearch` v1.2.3\n"),
        "{code}"
    );
    let encoded = base64::prelude::BASE64_STANDARD.encode(WASM_BYTES);
    assert!(code.contains(&encoded), "{code}");
    assert!(!code.contains(": number"), "{code}");
    assert!(!code.contains("engine_bg.wasm"), "{code}");
    assert!(code.contains("wasmSize"), "{code}");
}

#[tokio::test]
async fn test_missing_import_fails() {
    let root = tempfile::tempdir().unwrap();
    write(
        &root.path().join("src/index.js"),
        b"import { solve } from \"./missing.js\";\nexport { solve };\n",
    );

    let config = config_for(root.path(), "src/index.js");
    let err = SwcBundler.bundle(&config).await.unwrap_err();
    assert!(format!("{err:#}").contains("missing.js"), "{err:#}");
    assert!(!root.path().join("dist/wasm/index.js").exists());
}
