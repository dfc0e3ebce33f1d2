//! Source map discovery and decoding
//!
//! A compiled script names its map in a trailing `sourceMappingURL`
//! comment. The reference may be inline (`data:` URL), relative to the
//! script, or relative to the project root (the form the loader rewrites
//! references into). Failing all of those, `<script>.map` next to the
//! script is tried. A script with no map at all is reported against itself.

use crate::loader::last_source_map_ref;
use crate::paths;
use crate::result::{CovError, CovResult};
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where a script's map lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSource {
    /// A map file on disk
    File(PathBuf),
    /// A map embedded in the script
    Inline(Vec<u8>),
}

/// One decoded mapping: compiled position to original position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MappedPoint {
    /// 0-based compiled line
    pub gen_line: u32,
    /// 0-based compiled column, in UTF-16 units
    pub gen_col: u32,
    /// Index into [`SourceMapping::sources`]
    pub source: usize,
    /// 1-based original line
    pub line: u32,
    /// 0-based original column
    pub column: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapHeader {
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources_content: Vec<Option<String>>,
}

/// A decoded source map with sources resolved to absolute paths
#[derive(Debug, Clone)]
pub struct SourceMapping {
    sources: Vec<PathBuf>,
    contents: Vec<Option<String>>,
    points: Vec<MappedPoint>,
}

impl SourceMapping {
    /// Decode map JSON; relative sources resolve against `base_dir`
    pub fn from_slice(bytes: &[u8], base_dir: &Path, context: &str) -> CovResult<Self> {
        let header: MapHeader =
            serde_json::from_slice(bytes).map_err(|e| CovError::parse(context, e))?;
        let map = sourcemap::SourceMap::from_slice(bytes).map_err(|e| CovError::parse(context, e))?;

        let root = header.source_root.as_deref().unwrap_or("");
        let sources: Vec<PathBuf> = header
            .sources
            .iter()
            .map(|s| resolve_source(base_dir, root, s.as_deref().unwrap_or("")))
            .collect();

        let mut points: Vec<MappedPoint> = map
            .tokens()
            .filter(|token| token.get_source().is_some())
            .filter_map(|token| {
                let source = token.get_src_id() as usize;
                (source < sources.len()).then(|| MappedPoint {
                    gen_line: token.get_dst_line(),
                    gen_col: token.get_dst_col(),
                    source,
                    line: token.get_src_line() + 1,
                    column: token.get_src_col(),
                })
            })
            .collect();
        points.sort_unstable();
        points.dedup_by_key(|p| (p.gen_line, p.gen_col));

        Ok(Self {
            sources,
            contents: header.sources_content,
            points,
        })
    }

    /// Find and decode the map for a compiled script, if it has one
    pub fn load(compiled: &Path, text: &str, root: &Path) -> CovResult<Option<Self>> {
        let base_dir = compiled.parent().unwrap_or(root);
        match locate(compiled, text, root) {
            Some(MapSource::File(path)) => {
                let bytes = std::fs::read(&path).map_err(|e| CovError::io(&path, e))?;
                let map_dir = path.parent().unwrap_or(base_dir);
                let context = format!("source map {}", path.display());
                tracing::debug!(target: "cdpcov.sourcemap", map = %path.display(), "loading source map");
                Self::from_slice(&bytes, map_dir, &context).map(Some)
            }
            Some(MapSource::Inline(bytes)) => {
                let context = format!("inline source map in {}", compiled.display());
                Self::from_slice(&bytes, base_dir, &context).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Original sources, absolute
    #[must_use]
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Embedded content of a source, when the map carries it
    #[must_use]
    pub fn source_content(&self, index: usize) -> Option<&str> {
        self.contents.get(index).and_then(Option::as_deref)
    }

    /// Mappings ordered by compiled position
    #[must_use]
    pub fn points(&self) -> &[MappedPoint] {
        &self.points
    }
}

fn resolve_source(base_dir: &Path, source_root: &str, source: &str) -> PathBuf {
    let joined = if source_root.is_empty() {
        source.to_string()
    } else {
        format!("{}/{}", source_root.trim_end_matches('/'), source)
    };
    let stripped = match joined.strip_prefix("file://") {
        Some(rest) => rest.to_string(),
        None => match joined.split_once("://") {
            // Bundler schemes such as webpack:// are project-relative
            Some((_, rest)) => rest.trim_start_matches('/').to_string(),
            None => joined,
        },
    };
    paths::absolutize(Path::new(&stripped), base_dir)
}

/// Locate a script's map without reading it
#[must_use]
pub fn locate(compiled: &Path, text: &str, root: &Path) -> Option<MapSource> {
    let reference = last_source_map_ref(text).map(|m| m.as_str());

    if let Some(reference) = reference {
        if reference.starts_with("data:") {
            let inline = decode_data_url(reference).map(MapSource::Inline);
            if inline.is_none() {
                tracing::warn!(target: "cdpcov.sourcemap", script = %compiled.display(), "undecodable inline source map");
            }
            return inline;
        }
        let reference = reference.strip_prefix("file://").unwrap_or(reference);
        if !reference.contains("://") {
            let base_dir = compiled.parent().unwrap_or(root);
            for candidate in [
                paths::absolutize(Path::new(reference), base_dir),
                paths::absolutize(Path::new(reference), root),
            ] {
                if candidate.is_file() {
                    return Some(MapSource::File(candidate));
                }
            }
        }
    }

    let mut sibling = compiled.as_os_str().to_os_string();
    sibling.push(".map");
    let sibling = PathBuf::from(sibling);
    if sibling.is_file() {
        return Some(MapSource::File(sibling));
    }
    if let Some(reference) = reference {
        tracing::warn!(
            target: "cdpcov.sourcemap",
            script = %compiled.display(),
            reference = %reference,
            "source map not found; mapping script onto itself"
        );
    }
    None
}

fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (meta, payload) = url.strip_prefix("data:")?.split_once(',')?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD.decode(payload).ok()
    } else {
        Some(payload.as_bytes().to_vec())
    }
}
