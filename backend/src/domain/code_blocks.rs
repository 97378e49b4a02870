//! Turns fenced code blocks in an AI answer into virtual workspace files.
//!
//! Extraction is plain pattern matching: find ```` ```lang ... ``` ```` fences,
//! drop short snippets, then name each file after the contract it declares or,
//! failing that, after the contract kind its keywords suggest.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;
use utoipa::ToSchema;

/// Blocks at or below this many characters are treated as inline snippets.
pub const MIN_BLOCK_CHARS: usize = 50;

/// Language assumed for fences without a tag.
pub const DEFAULT_LANGUAGE: &str = "cadence";

const CONTRACTS_DIR: &str = "contracts";
const FALLBACK_NAME: &str = "Contract";

/// Base names chosen from content keywords, checked in order.
const NAME_HEURISTICS: &[(&str, &str)] = &[
    ("Marketplace", r"(?i)\b(marketplace|listing|storefront)\b"),
    ("NFTContract", r"(?i)\b(nft|nonfungibletoken)\b"),
    ("Staking", r"(?i)\b(staking|stake|unstake)\b"),
    ("DAO", r"(?i)\b(dao|governance|proposal)\b"),
    ("Escrow", r"(?i)\bescrow\b"),
    ("Voting", r"(?i)\b(voting|ballot|vote)\b"),
    ("Lottery", r"(?i)\b(lottery|raffle)\b"),
    ("FungibleToken", r"(?i)\b(fungibletoken|token|vault)\b"),
];

static FENCE_RE: OnceLock<Regex> = OnceLock::new();
static CONTRACT_NAME_RE: OnceLock<Regex> = OnceLock::new();
static HEURISTIC_RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|error| panic!("regex {pattern} failed to compile: {error}"))
}

fn fence_regex() -> &'static Regex {
    FENCE_RE.get_or_init(|| compile(r"```(\w+)?\n([\s\S]*?)```"))
}

fn contract_name_regex() -> &'static Regex {
    CONTRACT_NAME_RE.get_or_init(|| {
        compile(
            r"(?m)^\s*(?:access\(\s*\w+\s*\)\s+|pub\s+)?contract\s+(?:interface\s+)?([A-Za-z_][A-Za-z0-9_]*)",
        )
    })
}

fn heuristic_regexes() -> &'static [(&'static str, Regex)] {
    HEURISTIC_RES.get_or_init(|| {
        NAME_HEURISTICS
            .iter()
            .map(|(name, pattern)| (*name, compile(pattern)))
            .collect()
    })
}

/// A fenced block found in an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
}

/// Scan `text` for fenced blocks longer than [`MIN_BLOCK_CHARS`].
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let content = caps.get(2)?.as_str().trim();
            if content.chars().count() <= MIN_BLOCK_CHARS {
                return None;
            }
            let language = caps
                .get(1)
                .map_or(DEFAULT_LANGUAGE, |m| m.as_str())
                .to_ascii_lowercase();
            Some(CodeBlock {
                language,
                content: content.to_owned(),
            })
        })
        .collect()
}

/// Name declared by `contract Name`, `pub contract Name`, or
/// `access(all) contract Name`.
pub fn declared_contract_name(code: &str) -> Option<&str> {
    contract_name_regex()
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Base file name for a block: declared name, keyword guess, or fallback.
///
/// # Examples
/// ```
/// use forge_backend::domain::infer_base_name;
///
/// assert_eq!(infer_base_name("access(all) contract Counter { }"), "Counter");
/// assert_eq!(infer_base_name("// mints an NFT"), "NFTContract");
/// ```
pub fn infer_base_name(code: &str) -> &str {
    if let Some(name) = declared_contract_name(code) {
        return name;
    }
    heuristic_regexes()
        .iter()
        .find(|(_, re)| re.is_match(code))
        .map_or(FALLBACK_NAME, |(name, _)| *name)
}

/// File extension for a fence language.
pub fn extension_for(language: &str) -> &str {
    match language {
        "cadence" | "cdc" => "cdc",
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "rust" | "rs" => "rs",
        "python" | "py" => "py",
        "solidity" | "sol" => "sol",
        other => other,
    }
}

/// A file in the editor workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFile {
    pub id: Uuid,
    pub path: String,
    pub content: String,
    pub language: String,
    pub is_modified: bool,
}

/// Ordered store of virtual files with a current selection.
///
/// Paths are unique; colliding names get `_2`, `_3`, ... suffixes.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    files: Vec<VirtualFile>,
    selected: Option<Uuid>,
}

impl Workspace {
    /// Empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workspace from every qualifying block in `text`.
    ///
    /// # Examples
    /// ```
    /// use forge_backend::domain::Workspace;
    ///
    /// let answer = "```cadence\naccess(all) contract Counter {\n    access(all) var count: Int\n}\n```";
    /// let workspace = Workspace::from_answer(answer);
    /// assert_eq!(workspace.files()[0].path, "contracts/Counter.cdc");
    /// ```
    pub fn from_answer(text: &str) -> Self {
        let mut workspace = Self::new();
        for block in extract_code_blocks(text) {
            workspace.add_block(block);
        }
        workspace
    }

    /// Add a block as a new modified file and return its id.
    pub fn add_block(&mut self, block: CodeBlock) -> Uuid {
        let base = infer_base_name(&block.content).to_owned();
        let extension = extension_for(&block.language).to_owned();
        let path = self.unique_path(&base, &extension);
        let id = Uuid::new_v4();
        self.files.push(VirtualFile {
            id,
            path,
            content: block.content,
            language: block.language,
            is_modified: true,
        });
        id
    }

    fn unique_path(&self, base: &str, extension: &str) -> String {
        let taken: HashSet<&str> = self.files.iter().map(|f| f.path.as_str()).collect();
        let first = format!("{CONTRACTS_DIR}/{base}.{extension}");
        if !taken.contains(first.as_str()) {
            return first;
        }
        (2_u32..)
            .map(|n| format!("{CONTRACTS_DIR}/{base}_{n}.{extension}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or(first)
    }

    /// Replace a file's content and flag it as modified.
    pub fn update(&mut self, id: Uuid, content: impl Into<String>) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.content = content.into();
                file.is_modified = true;
                true
            }
            None => false,
        }
    }

    /// Remove a file, clearing the selection if it pointed at it.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.files.len() != before
    }

    /// Select an existing file.
    pub fn select(&mut self, id: Uuid) -> bool {
        let exists = self.files.iter().any(|f| f.id == id);
        if exists {
            self.selected = Some(id);
        }
        exists
    }

    /// Currently selected file.
    pub fn selected(&self) -> Option<&VirtualFile> {
        self.selected
            .and_then(|id| self.files.iter().find(|f| f.id == id))
    }

    /// Drop every file and the selection.
    pub fn clear(&mut self) {
        self.files.clear();
        self.selected = None;
    }

    /// Files in insertion order.
    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }

    /// Consume the workspace, yielding its files.
    pub fn into_files(self) -> Vec<VirtualFile> {
        self.files
    }
}
