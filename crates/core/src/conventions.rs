//! Dependency-manifest awareness (spec's supplemented-feature list):
//! recognizing `Cargo.toml`/`package.json`/`go.mod` and surfacing their
//! declared dependencies as `relatedConcepts` when a manifest file itself is
//! a search result. Ported close to verbatim from the teacher's
//! `DependencyScanner` trait and its three scanners in `server/src/scan.rs`.

use std::path::Path;

/// Detects and parses one family of dependency manifest.
pub trait DependencyScanner: Send + Sync {
    fn matches(&self, abs_path: &Path) -> bool;
    fn module_name(&self, abs_path: &Path) -> Option<String>;
    /// Returns (direct/production deps, dev-only deps).
    fn parse_deps(&self, content: &str) -> (Vec<String>, Vec<String>);
}

struct CargoTomlScanner;

impl DependencyScanner for CargoTomlScanner {
    fn matches(&self, abs_path: &Path) -> bool {
        abs_path.file_name().and_then(|n| n.to_str()).map(|n| n == "Cargo.toml").unwrap_or(false)
    }

    fn module_name(&self, abs_path: &Path) -> Option<String> {
        if let Ok(content) = std::fs::read_to_string(abs_path) {
            let name_re = regex::Regex::new(r#"(?m)^\s*name\s*=\s*"([^"]+)""#).unwrap();
            if let Some(cap) = name_re.captures(&content) {
                return Some(cap[1].to_string());
            }
        }
        abs_path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()).map(|s| s.to_string())
    }

    fn parse_deps(&self, content: &str) -> (Vec<String>, Vec<String>) {
        let dep_key_re = regex::Regex::new(r#"(?m)^(\w[\w-]*)\s*="#).unwrap();
        let mut public = Vec::new();
        let mut private = Vec::new();
        let mut in_deps = false;
        let mut in_dev_deps = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("[dependencies]") {
                in_deps = true;
                in_dev_deps = false;
                continue;
            }
            if trimmed.starts_with("[dev-dependencies]") {
                in_deps = false;
                in_dev_deps = true;
                continue;
            }
            if trimmed.starts_with('[') {
                in_deps = false;
                in_dev_deps = false;
                continue;
            }
            if in_deps {
                if let Some(cap) = dep_key_re.captures(trimmed) {
                    public.push(cap[1].to_string());
                }
            } else if in_dev_deps {
                if let Some(cap) = dep_key_re.captures(trimmed) {
                    private.push(cap[1].to_string());
                }
            }
        }

        (public, private)
    }
}

struct PackageJsonScanner;

impl DependencyScanner for PackageJsonScanner {
    fn matches(&self, abs_path: &Path) -> bool {
        abs_path.file_name().and_then(|n| n.to_str()).map(|n| n == "package.json").unwrap_or(false)
    }

    fn module_name(&self, abs_path: &Path) -> Option<String> {
        if let Ok(content) = std::fs::read_to_string(abs_path) {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(name) = json["name"].as_str() {
                    return Some(name.to_string());
                }
            }
        }
        abs_path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()).map(|s| s.to_string())
    }

    fn parse_deps(&self, content: &str) -> (Vec<String>, Vec<String>) {
        let json: serde_json::Value = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(_) => return (vec![], vec![]),
        };

        let extract_keys = |key: &str| -> Vec<String> {
            json[key].as_object().map(|obj| obj.keys().cloned().collect()).unwrap_or_default()
        };

        (extract_keys("dependencies"), extract_keys("devDependencies"))
    }
}

struct GoModScanner;

impl DependencyScanner for GoModScanner {
    fn matches(&self, abs_path: &Path) -> bool {
        abs_path.file_name().and_then(|n| n.to_str()).map(|n| n == "go.mod").unwrap_or(false)
    }

    fn module_name(&self, abs_path: &Path) -> Option<String> {
        if let Ok(content) = std::fs::read_to_string(abs_path) {
            let module_re = regex::Regex::new(r"(?m)^module\s+(\S+)").unwrap();
            if let Some(cap) = module_re.captures(&content) {
                let full = &cap[1];
                return Some(full.rsplit('/').next().unwrap_or(full).to_string());
            }
        }
        abs_path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()).map(|s| s.to_string())
    }

    fn parse_deps(&self, content: &str) -> (Vec<String>, Vec<String>) {
        let require_re = regex::Regex::new(r#"(?m)^\s+(\S+)\s+v"#).unwrap();
        let mut public = Vec::new();
        let mut in_require = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("require (") || trimmed == "require (" {
                in_require = true;
                continue;
            }
            if in_require && trimmed == ")" {
                in_require = false;
                continue;
            }
            if in_require {
                if let Some(cap) = require_re.captures(line) {
                    let full = &cap[1];
                    let short = full.rsplit('/').next().unwrap_or(full);
                    public.push(short.to_string());
                }
            }
        }

        (public, vec![])
    }
}

pub fn default_scanners() -> Vec<Box<dyn DependencyScanner>> {
    vec![Box::new(CargoTomlScanner), Box::new(PackageJsonScanner), Box::new(GoModScanner)]
}

/// If `path` is a recognized manifest, parse its content and return the
/// module name plus direct/dev dependency names — fed into
/// `ResultContext::related_concepts` when the manifest itself is the hit.
pub fn manifest_related_concepts(path: &Path, content: &str) -> Option<(Option<String>, Vec<String>)> {
    for scanner in default_scanners() {
        if scanner.matches(path) {
            let module_name = scanner.module_name(path);
            let (direct, dev) = scanner.parse_deps(content);
            let mut concepts = direct;
            concepts.extend(dev);
            return Some((module_name, concepts));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cargo_toml_splits_direct_and_dev_deps() {
        let content = r#"
[package]
name = "demo"

[dependencies]
serde = "1"
thiserror = "1"

[dev-dependencies]
tempfile = "3"
"#;
        let (module, concepts) = manifest_related_concepts(&PathBuf::from("Cargo.toml"), content).unwrap();
        assert_eq!(module, Some("demo".to_string()));
        assert!(concepts.contains(&"serde".to_string()));
        assert!(concepts.contains(&"tempfile".to_string()));
    }

    #[test]
    fn package_json_reads_both_dependency_sections() {
        let content = r#"{"name":"demo","dependencies":{"react":"18"},"devDependencies":{"vitest":"1"}}"#;
        let (module, concepts) = manifest_related_concepts(&PathBuf::from("package.json"), content).unwrap();
        assert_eq!(module, Some("demo".to_string()));
        assert!(concepts.contains(&"react".to_string()));
        assert!(concepts.contains(&"vitest".to_string()));
    }

    #[test]
    fn go_mod_extracts_short_module_names() {
        let content = "module github.com/acme/demo\n\nrequire (\n\tgithub.com/spf13/cobra v1.8.0\n)\n";
        let (module, concepts) = manifest_related_concepts(&PathBuf::from("go.mod"), content).unwrap();
        assert_eq!(module, Some("demo".to_string()));
        assert_eq!(concepts, vec!["cobra".to_string()]);
    }

    #[test]
    fn non_manifest_files_are_ignored() {
        assert!(manifest_related_concepts(&PathBuf::from("README.md"), "# hi").is_none());
    }
}
