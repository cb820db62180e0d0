use std::sync::Arc;

/// Where a document candidate came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Passed explicitly on the command line
    Manual,
    /// Extracted from a zip archive
    Archive,
    /// Downloaded from a source URL in the spreadsheet
    Remote { url: String },
}

/// An in-memory file that may become a list version's document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCandidate {
    /// File name used for matching and for the uploaded file
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub source: DocumentSource,
}

impl DocumentCandidate {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>, source: DocumentSource) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            source,
        }
    }

    /// Name without directories or extension
    pub fn stem(&self) -> &str {
        let file = self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name);
        match file.rfind('.') {
            Some(dot) if dot > 0 => &file[..dot],
            _ => file,
        }
    }
}

/// How a document was assigned to a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Manifest,
    Heuristic,
    /// Heuristic match shared with other groups at the same score
    Tie,
}

impl MatchType {
    pub fn label(&self) -> &'static str {
        match self {
            MatchType::Manifest => "[Manifest]",
            MatchType::Heuristic => "[Heuristic]",
            MatchType::Tie => "[Tie]",
        }
    }
}

/// Points a document earned against one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchScore {
    pub grade: bool,
    pub level: bool,
    pub year: bool,
    pub containment: bool,
}

impl MatchScore {
    pub fn total(&self) -> u8 {
        (self.grade as u8) * 3 + (self.level as u8) * 2 + self.year as u8 + self.containment as u8
    }

    /// Three points, or two points when the grade or level itself agrees
    pub fn is_acceptable(&self) -> bool {
        let total = self.total();
        total >= 3 || (total >= 2 && (self.grade || self.level))
    }
}

/// One document assigned to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMatch {
    /// Index into the candidate list
    pub document: usize,
    pub match_type: MatchType,
    /// Heuristic total; manifest matches carry none
    pub score: Option<u8>,
}

/// Documents assigned to one group, in assignment order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchInfo {
    pub matches: Vec<DocumentMatch>,
}

impl MatchInfo {
    /// Append a document unless it is already assigned
    pub fn add(&mut self, document: usize, match_type: MatchType, score: Option<u8>) {
        if !self.has_document(document) {
            self.matches.push(DocumentMatch {
                document,
                match_type,
                score,
            });
        }
    }

    pub fn has_document(&self, document: usize) -> bool {
        self.matches.iter().any(|m| m.document == document)
    }

    pub fn documents(&self) -> impl Iterator<Item = usize> + '_ {
        self.matches.iter().map(|m| m.document)
    }

    pub fn count(&self) -> usize {
        self.matches.len()
    }
}
