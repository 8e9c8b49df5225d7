//! Analysis Kinds
//!
//! The request vocabulary of the pipeline. Each kind is one client-invoked
//! streaming request running a fixed phase sequence on the server; the
//! multi-request jobs (recon, then deep recon seeded with the recon result,
//! then the main pass seeded with both) are stitched together on the client.

use serde::{Deserialize, Serialize};

/// One analysis request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// First look over the conversation; feeds the later passes.
    Recon,
    /// Deeper read seeded with the recon result.
    DeepRecon,
    /// The main four-pass psychology analysis, seeded with both recon results.
    Cps,
    /// Standalone subtext reading.
    Subtext,
}

impl AnalysisKind {
    /// All request kinds, in saga order.
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Recon,
        AnalysisKind::DeepRecon,
        AnalysisKind::Cps,
        AnalysisKind::Subtext,
    ];

    /// Parse a kind from its wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recon" => Some(AnalysisKind::Recon),
            "deep_recon" => Some(AnalysisKind::DeepRecon),
            "cps" => Some(AnalysisKind::Cps),
            "subtext" => Some(AnalysisKind::Subtext),
            _ => None,
        }
    }

    /// The seed key this kind's result is carried under in later request
    /// bodies, and the key its output appears under in backend inputs.
    pub fn seed_key(&self) -> &'static str {
        match self {
            AnalysisKind::Recon => "recon",
            AnalysisKind::DeepRecon => "deep_recon",
            AnalysisKind::Cps => "cps",
            AnalysisKind::Subtext => "subtext",
        }
    }

    /// URL path segment of this kind's streaming endpoint.
    pub fn path_segment(&self) -> &'static str {
        match self {
            AnalysisKind::Recon => "recon",
            AnalysisKind::DeepRecon => "deep-recon",
            AnalysisKind::Cps => "cps",
            AnalysisKind::Subtext => "subtext",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.seed_key())
    }
}

/// Exact status strings emitted as progress checkpoints. The client phase
/// maps key off these verbatim, so they are shared constants rather than
/// free-form text at the emit site.
pub mod status {
    /// Optional research pre-pass of a recon request.
    pub const RESEARCH: &str = "Gathering background signals";
    /// Required recon pass.
    pub const RECON: &str = "Scanning conversation";
    /// Deep recon pass.
    pub const DEEP_RECON: &str = "Tracing relational dynamics";
    /// Main analysis, pass 1.
    pub const CPS_PATTERNS: &str = "Scoring communication patterns";
    /// Main analysis, pass 2.
    pub const CPS_LABOR: &str = "Weighing emotional labor";
    /// Main analysis, pass 3.
    pub const CPS_SUBTEXT: &str = "Reading the subtext";
    /// Main analysis, pass 4.
    pub const CPS_PROFILE: &str = "Compiling the profile";
    /// Standalone subtext reading.
    pub const SUBTEXT: &str = "Reading between the lines";
}
