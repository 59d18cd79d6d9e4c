//
// core_modules.rs
//
// Read-only core modules embedded in the binary
//

use tower_lsp::lsp_types::Url;

use crate::forest::Forest;
use crate::module_index::module_path_suffix;

/// Scheme of the virtual documents holding the embedded core modules.
pub const CORE_SCHEME: &str = "elm-core";

/// `(module name, source)` for every embedded core module.
pub const CORE_MODULES: &[(&str, &str)] = &[
    ("Basics", include_str!("../core/Basics.elm")),
    ("List", include_str!("../core/List.elm")),
    ("Maybe", include_str!("../core/Maybe.elm")),
    ("Result", include_str!("../core/Result.elm")),
    ("String", include_str!("../core/String.elm")),
    ("Char", include_str!("../core/Char.elm")),
    ("Tuple", include_str!("../core/Tuple.elm")),
    ("Debug", include_str!("../core/Debug.elm")),
    ("Platform", include_str!("../core/Platform.elm")),
    ("Platform.Cmd", include_str!("../core/Platform/Cmd.elm")),
    ("Platform.Sub", include_str!("../core/Platform/Sub.elm")),
];

/// `elm-core:///Platform/Cmd.elm` for `Platform.Cmd`.
pub fn core_uri(module: &str) -> Option<Url> {
    Url::parse(&format!("{}:///{}", CORE_SCHEME, module_path_suffix(module))).ok()
}

pub fn is_core_uri(uri: &Url) -> bool {
    uri.scheme() == CORE_SCHEME
}

/// Source text of an embedded module, for serving `elm-core:` documents.
pub fn core_source(uri: &Url) -> Option<&'static str> {
    if !is_core_uri(uri) {
        return None;
    }
    CORE_MODULES
        .iter()
        .find(|(name, _)| core_uri(name).as_ref() == Some(uri))
        .map(|(_, source)| *source)
}

/// Install every core module into the forest as a non-writeable,
/// referenced file.
pub fn load_into(forest: &mut Forest) {
    for (name, source) in CORE_MODULES {
        match core_uri(name) {
            Some(uri) => forest.set_text(uri, false, true, source),
            None => log::warn!("Invalid core module uri for {}", name),
        }
    }
    log::debug!("Loaded {} core modules", CORE_MODULES.len());
}
