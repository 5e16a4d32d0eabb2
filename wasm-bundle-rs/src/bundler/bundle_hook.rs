//! `import.meta` handling during bundling.
//!
//! Once bundled, every module lives inside the bundle file, so the package's
//! URL lookups (worker entry points, sibling assets) must resolve against the
//! bundle's own `import.meta` rather than the source file's location.

use deno_ast::swc::ast::{Expr, KeyValueProp, MemberExpr, MemberProp, MetaPropExpr, MetaPropKind, PropName};
use deno_ast::swc::bundler::{Hook, ModuleRecord};
use deno_ast::swc::common::Span;

/// Forwards `import.meta.url` and `import.meta.resolve` of every bundled
/// module to the bundle's `import.meta`.
pub struct ForwardImportMeta;

const FORWARDED_PROPS: &[&str] = &["url", "resolve"];

impl Hook for ForwardImportMeta {
    fn get_import_meta_props(
        &self,
        span: Span,
        _module_record: &ModuleRecord,
    ) -> Result<Vec<KeyValueProp>, anyhow::Error> {
        Ok(FORWARDED_PROPS
            .iter()
            .map(|prop| KeyValueProp {
                key: PropName::Ident((*prop).into()),
                value: Box::new(Expr::Member(MemberExpr {
                    span,
                    obj: Box::new(Expr::MetaProp(MetaPropExpr {
                        span,
                        kind: MetaPropKind::ImportMeta,
                    })),
                    prop: MemberProp::Ident((*prop).into()),
                })),
            })
            .collect())
    }
}
