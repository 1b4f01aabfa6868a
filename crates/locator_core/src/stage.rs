use serde::{Deserialize, Serialize};
use url::Url;

/// What the current navigation context represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Search results listing the branches that mention the query.
    SearchRoot,
    /// A single branch page, pointing onward to its leaf collection.
    BranchDetail,
    /// The page listing the leaf entries to probe.
    LeafCollection,
    Unrelated,
}

/// Structural description of the target site's navigable references.
///
/// Paths are matched case-insensitively as suffixes of the reference path;
/// parameter names are matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteLayout {
    pub origin: String,
    pub search_path: String,
    pub search_param: String,
    pub branch_path: String,
    pub branch_id_param: String,
    /// Comma separated leaf collection ids carried by a branch reference.
    pub branch_hint_param: String,
    /// Used for synthetic labels such as `Company 42`.
    pub branch_kind: String,
    pub leaf_path: String,
    pub leaf_id_param: String,
    pub leaf_extra_params: Vec<(String, String)>,
    pub candidate_path: String,
    pub candidate_id_param: String,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            origin: "http://localhost".to_string(),
            search_path: "/nihul/Wizard.php".to_string(),
            search_param: "q".to_string(),
            branch_path: "/nihul/Wizard.php".to_string(),
            branch_id_param: "CompanyID".to_string(),
            branch_hint_param: "FindedProjects".to_string(),
            branch_kind: "Company".to_string(),
            leaf_path: "/nihul/AddProject2.php".to_string(),
            leaf_id_param: "ProjectID".to_string(),
            leaf_extra_params: vec![("BrokerageProject".to_string(), "no".to_string())],
            candidate_path: "/preferences/EditUser.php".to_string(),
            candidate_id_param: "UserID".to_string(),
        }
    }
}

impl SiteLayout {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Maps a navigable reference to a stage using only its path and parameters.
    pub fn classify(&self, navigable_ref: &str) -> Stage {
        let Ok(url) = Url::parse(navigable_ref.trim()) else {
            return Stage::Unrelated;
        };
        let path = url.path();
        let has = |name: &str| url.query_pairs().any(|(k, _)| k == name);

        if path_matches(path, &self.branch_path) && has(&self.branch_id_param) {
            return Stage::BranchDetail;
        }
        if path_matches(path, &self.search_path)
            && has(&self.search_param)
            && !has(&self.branch_id_param)
        {
            return Stage::SearchRoot;
        }
        if path_matches(path, &self.leaf_path) && has(&self.leaf_id_param) {
            return Stage::LeafCollection;
        }
        Stage::Unrelated
    }

    pub fn search_url(&self, query: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.origin)?.join(&self.search_path)?;
        url.query_pairs_mut().append_pair(&self.search_param, query);
        Ok(url.into())
    }

    /// Leaf collection reference for a branch detail reference, from the first hinted id.
    pub fn leaf_collection_for(&self, branch_ref: &str) -> Option<String> {
        let branch = Url::parse(branch_ref.trim()).ok()?;
        let branch_id = param(&branch, &self.branch_id_param).unwrap_or_default();
        let first_hint = param(&branch, &self.branch_hint_param)?
            .split(',')
            .map(|part| part.chars().filter(char::is_ascii_digit).collect::<String>())
            .find(|part| !part.is_empty())?;

        let mut leaf = branch.join(&self.leaf_path).ok()?;
        leaf.set_query(None);
        {
            let mut pairs = leaf.query_pairs_mut();
            pairs.append_pair(&self.leaf_id_param, &first_hint);
            pairs.append_pair(&self.branch_id_param, &branch_id);
            for (key, value) in &self.leaf_extra_params {
                pairs.append_pair(key, value);
            }
        }
        Some(leaf.into())
    }

    /// Synthetic label for a branch whose page offered no readable name.
    pub fn synthetic_branch_label(&self, id: &str) -> String {
        if id.is_empty() {
            self.branch_kind.clone()
        } else {
            format!("{} {}", self.branch_kind, id)
        }
    }

    pub fn branch_file(&self) -> &str {
        file_name(&self.branch_path)
    }

    pub fn candidate_file(&self) -> &str {
        file_name(&self.candidate_path)
    }

    /// Directory of the known page whose file name matches `file`, if any.
    pub fn directory_of(&self, file: &str) -> Option<&str> {
        [
            &self.search_path,
            &self.branch_path,
            &self.leaf_path,
            &self.candidate_path,
        ]
        .into_iter()
        .find(|path| file_name(path).eq_ignore_ascii_case(file))
        .map(|path| directory(path))
    }

    /// Whether `segment` is the first directory of any known page.
    pub fn is_known_directory(&self, segment: &str) -> bool {
        [
            &self.search_path,
            &self.branch_path,
            &self.leaf_path,
            &self.candidate_path,
        ]
        .into_iter()
        .filter_map(|path| path.trim_start_matches('/').split('/').next())
        .any(|first| !first.contains('.') && first.eq_ignore_ascii_case(segment))
    }
}

fn path_matches(path: &str, pattern: &str) -> bool {
    path.to_ascii_lowercase()
        .ends_with(&pattern.to_ascii_lowercase())
}

fn param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.trim().to_string())
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}
