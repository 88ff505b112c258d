//! Typed request parameters and reply records.
//!
//! Reply records mirror the server's camelCase field names and default every
//! field, so replies from older or newer servers still decode.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A protocol version advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl ProtocolVersion {
    /// Builds a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.major, self.minor)
    }
}

/// Directories and generator selected by the `handshake` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeParams {
    /// Top-level source directory.
    pub source_directory: String,
    /// Build directory.
    pub build_directory: String,
    /// Generator name, e.g. `Unix Makefiles`.
    pub generator: String,
    /// Extra generator, e.g. `CodeBlocks`.
    pub extra_generator: Option<String>,
    /// Generator platform.
    pub platform: Option<String>,
    /// Generator toolset.
    pub toolset: Option<String>,
}

impl HandshakeParams {
    /// Parameters with the mandatory fields set.
    #[must_use]
    pub fn new(
        source_directory: impl Into<String>,
        build_directory: impl Into<String>,
        generator: impl Into<String>,
    ) -> Self {
        Self {
            source_directory: source_directory.into(),
            build_directory: build_directory.into(),
            generator: generator.into(),
            extra_generator: None,
            platform: None,
            toolset: None,
        }
    }

    /// Sets the extra generator.
    #[must_use]
    pub fn with_extra_generator(mut self, extra_generator: impl Into<String>) -> Self {
        self.extra_generator = Some(extra_generator.into());
        self
    }

    /// Sets the generator platform.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Sets the generator toolset.
    #[must_use]
    pub fn with_toolset(mut self, toolset: impl Into<String>) -> Self {
        self.toolset = Some(toolset.into());
        self
    }
}

/// Wire body of a `handshake` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HandshakeRequest<'a> {
    pub(crate) protocol_version: ProtocolVersion,
    pub(crate) source_directory: &'a str,
    pub(crate) build_directory: &'a str,
    pub(crate) generator: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) extra_generator: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) platform: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) toolset: Option<&'a str>,
}

impl<'a> HandshakeRequest<'a> {
    pub(crate) fn new(protocol_version: ProtocolVersion, params: &'a HandshakeParams) -> Self {
        Self {
            protocol_version,
            source_directory: &params.source_directory,
            build_directory: &params.build_directory,
            generator: &params.generator,
            extra_generator: params.extra_generator.as_deref(),
            platform: params.platform.as_deref(),
            toolset: params.toolset.as_deref(),
        }
    }
}

/// Reply to `globalSettings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    /// Top-level source directory.
    pub source_directory: String,
    /// Build directory.
    pub build_directory: String,
    /// Active generator.
    pub generator: String,
    /// Active extra generator.
    pub extra_generator: String,
    /// Whether system variables are checked.
    pub check_system_vars: bool,
    /// Whether debug output is enabled.
    pub debug_output: bool,
    /// Whether tracing is enabled.
    pub trace: bool,
    /// Whether traced variables are expanded.
    pub trace_expand: bool,
    /// Whether uninitialised variables are reported.
    pub warn_uninitialized: bool,
    /// Whether unused variables are reported.
    pub warn_unused: bool,
    /// Whether unused command-line variables are reported.
    pub warn_unused_cli: bool,
    /// Server capability description, passed through untouched.
    pub capabilities: Value,
}

/// Reply to `codemodel`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeModel {
    /// One entry per build configuration.
    pub configurations: Vec<Configuration>,
}

/// A build configuration in the code model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Configuration name, e.g. `Debug`.
    pub name: String,
    /// Projects defined in this configuration.
    pub projects: Vec<Project>,
}

/// A CMake `project()` in the code model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Source directory of the project.
    pub source_directory: String,
    /// Build directory of the project.
    pub build_directory: String,
    /// Targets the project defines.
    pub targets: Vec<Target>,
}

/// A build target in the code model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    /// Target name.
    pub name: String,
    /// Target type, e.g. `EXECUTABLE` or `STATIC_LIBRARY`.
    #[serde(rename = "type")]
    pub target_type: String,
    /// Full name of the main artifact.
    pub full_name: String,
    /// Source directory of the target.
    pub source_directory: String,
    /// Build directory of the target.
    pub build_directory: String,
    /// Paths of the produced artifacts.
    pub artifacts: Vec<String>,
    /// Language used to link the target.
    pub linker_language: String,
    /// Libraries linked into the target.
    pub link_libraries: String,
    /// Flags passed to the linker.
    pub link_flags: String,
    /// Source files grouped by compile settings.
    pub file_groups: Vec<FileGroup>,
}

/// Sources sharing the same compile settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileGroup {
    /// Source language.
    pub language: String,
    /// Compile flags.
    pub compile_flags: String,
    /// Include directories.
    pub include_path: Vec<IncludePath>,
    /// Preprocessor definitions.
    pub defines: Vec<String>,
    /// Source files, relative to the target source directory.
    pub sources: Vec<String>,
    /// Whether the sources are generated at build time.
    pub is_generated: bool,
}

/// An include directory of a file group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncludePath {
    /// The directory.
    pub path: String,
    /// Whether it is a system include directory.
    pub is_system: bool,
}

/// Reply to `cmakeInputs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CMakeInputs {
    /// CMake's own module directory.
    pub cmake_root_directory: String,
    /// Top-level source directory.
    pub source_directory: String,
    /// Files read while configuring.
    pub build_files: Vec<BuildFiles>,
}

/// A group of files read while configuring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildFiles {
    /// Whether the files belong to CMake itself.
    #[serde(rename = "isCMake")]
    pub is_cmake: bool,
    /// Whether the files are temporary.
    pub is_temporary: bool,
    /// The file paths.
    pub sources: Vec<String>,
}

/// Reply to `cache`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CMakeCache {
    /// Cache entries.
    pub cache: Vec<CacheEntry>,
}

impl CMakeCache {
    /// Looks up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.cache.iter().find(|entry| entry.key == key)
    }
}

/// A single cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheEntry {
    /// Variable name.
    pub key: String,
    /// Entry type, e.g. `STRING` or `BOOL`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Entry value.
    pub value: String,
    /// Properties such as `ADVANCED` and `HELPSTRING`.
    pub properties: BTreeMap<String, String>,
}

/// Reply to `fileSystemWatchers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSystemWatchers {
    /// Watched files.
    #[serde(rename = "watchedFiles")]
    pub files: Vec<String>,
    /// Watched directories.
    #[serde(rename = "watchedDirectories")]
    pub directories: Vec<String>,
}

/// Payload of a `progress` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressData {
    /// Human-readable description of the current step.
    pub progress_message: String,
    /// Lower bound of the progress range.
    pub progress_minimum: i64,
    /// Upper bound of the progress range.
    pub progress_maximum: i64,
    /// Current position within the range.
    pub progress_current: i64,
    /// The request this progress belongs to.
    pub in_reply_to: Option<String>,
    /// Cookie of the request this progress belongs to.
    pub cookie: Option<String>,
}

impl ProgressData {
    /// Completed share of the range in `[0, 1]`, or `None` for an empty range.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::float_arithmetic,
        reason = "progress ratios are approximate by nature"
    )]
    pub fn fraction(&self) -> Option<f64> {
        let span = self.progress_maximum.checked_sub(self.progress_minimum)?;
        if span <= 0 {
            return None;
        }
        let done = self
            .progress_current
            .clamp(self.progress_minimum, self.progress_maximum)
            - self.progress_minimum;
        Some(done as f64 / span as f64)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn handshake_request_omits_unset_fields() {
        let params = HandshakeParams::new("/src", "/build", "Ninja");

        let body = serde_json::to_value(HandshakeRequest::new(ProtocolVersion::new(1, 1), &params))
            .expect("encode failed");

        assert_eq!(
            body,
            json!({
                "protocolVersion": {"major": 1, "minor": 1},
                "sourceDirectory": "/src",
                "buildDirectory": "/build",
                "generator": "Ninja"
            })
        );
    }

    #[rstest]
    fn handshake_request_carries_optional_fields() {
        let params = HandshakeParams::new("/src", "/build", "Visual Studio 17 2022")
            .with_extra_generator("CodeBlocks")
            .with_platform("x64")
            .with_toolset("v143");

        let body = serde_json::to_value(HandshakeRequest::new(ProtocolVersion::new(1, 2), &params))
            .expect("encode failed");

        assert_eq!(body["extraGenerator"], "CodeBlocks");
        assert_eq!(body["platform"], "x64");
        assert_eq!(body["toolset"], "v143");
    }

    #[rstest]
    fn decodes_code_model_tree() {
        let reply = json!({
            "type": "reply",
            "cookie": "c",
            "inReplyTo": "codemodel",
            "configurations": [{
                "name": "Debug",
                "projects": [{
                    "name": "demo",
                    "sourceDirectory": "/src",
                    "buildDirectory": "/build",
                    "targets": [{
                        "name": "app",
                        "type": "EXECUTABLE",
                        "fileGroups": [{
                            "language": "CXX",
                            "includePath": [{"path": "/src/include"}, {"path": "/usr/include", "isSystem": true}],
                            "defines": ["NDEBUG"],
                            "sources": ["main.cpp"]
                        }]
                    }]
                }]
            }]
        });

        let model: CodeModel = serde_json::from_value(reply).expect("decode failed");

        let target = &model.configurations[0].projects[0].targets[0];
        assert_eq!(target.target_type, "EXECUTABLE");
        let group = &target.file_groups[0];
        assert_eq!(group.language, "CXX");
        assert!(!group.include_path[0].is_system);
        assert!(group.include_path[1].is_system);
        assert_eq!(group.sources, vec!["main.cpp"]);
    }

    #[rstest]
    fn decodes_cache_entries_and_looks_up_keys() {
        let reply = json!({
            "cache": [
                {"key": "CMAKE_BUILD_TYPE", "type": "STRING", "value": "Debug",
                 "properties": {"HELPSTRING": "Choose the type of build"}},
                {"key": "BUILD_TESTING", "type": "BOOL", "value": "ON", "properties": {"ADVANCED": "1"}}
            ]
        });

        let cache: CMakeCache = serde_json::from_value(reply).expect("decode failed");

        let entry = cache.get("BUILD_TESTING").expect("missing entry");
        assert_eq!(entry.entry_type, "BOOL");
        assert_eq!(entry.properties.get("ADVANCED").map(String::as_str), Some("1"));
        assert!(cache.get("MISSING").is_none());
    }

    #[rstest]
    fn decodes_inputs_with_cmake_flag() {
        let reply = json!({
            "cmakeRootDirectory": "/usr/share/cmake",
            "sourceDirectory": "/src",
            "buildFiles": [{"isCMake": true, "isTemporary": false, "sources": ["Modules/CMakeCInformation.cmake"]}]
        });

        let inputs: CMakeInputs = serde_json::from_value(reply).expect("decode failed");

        assert!(inputs.build_files[0].is_cmake);
        assert_eq!(inputs.cmake_root_directory, "/usr/share/cmake");
    }

    #[rstest]
    fn global_settings_tolerate_missing_fields() {
        let settings: GlobalSettings =
            serde_json::from_value(json!({"type": "reply", "generator": "Ninja", "trace": true}))
                .expect("decode failed");

        assert_eq!(settings.generator, "Ninja");
        assert!(settings.trace);
        assert!(!settings.debug_output);
    }

    #[rstest]
    #[case(0, 100, 25, Some(0.25))]
    #[case(0, 100, 250, Some(1.0))]
    #[case(10, 10, 10, None)]
    fn progress_fraction(
        #[case] minimum: i64,
        #[case] maximum: i64,
        #[case] current: i64,
        #[case] expected: Option<f64>,
    ) {
        let progress = ProgressData {
            progress_minimum: minimum,
            progress_maximum: maximum,
            progress_current: current,
            ..ProgressData::default()
        };

        assert_eq!(progress.fraction(), expected);
    }

    #[rstest]
    fn versions_display_as_dotted_pairs() {
        assert_eq!(ProtocolVersion::new(1, 2).to_string(), "1.2");
    }
}
