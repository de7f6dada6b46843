//! Per-macroblock state shared by the VP8 decoder and encoder
//!
//! Holds the decoded mode information of every macroblock in a frame and
//! the above/left "has coefficients" trackers that select the first token
//! context of each block.

use super::tables::{IntraMode, SubBlockMode, BLOCK_TO_ABOVE_ENT, BLOCK_TO_LEFT_ENT};

/// Index of the Y2 block in coding order terms (`BLOCK_TO_*_ENT`)
pub const Y2_BLOCK: usize = 24;
/// First chroma U block
pub const U_BLOCK_START: usize = 16;
/// First chroma V block
pub const V_BLOCK_START: usize = 20;

/// Tracker slots per macroblock: 4 Y, 2 U, 2 V, 1 Y2
const CONTEXT_SLOTS: usize = 9;
const Y2_SLOT: usize = 8;

/// Reference frame used by a macroblock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefFrame {
    #[default]
    Intra,
    Last,
    Golden,
    AltRef,
}

impl RefFrame {
    /// Index into the sign-bias table
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Motion vector in quarter-pixel units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionVector {
    pub row: i16,
    pub col: i16,
}

impl MotionVector {
    pub const ZERO: MotionVector = MotionVector { row: 0, col: 0 };

    pub fn new(row: i16, col: i16) -> Self {
        MotionVector { row, col }
    }

    pub fn is_zero(&self) -> bool {
        self.row == 0 && self.col == 0
    }
}

/// Inter prediction mode of a macroblock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterMode {
    Nearest,
    Near,
    Zero,
    New,
    Split,
}

/// Mode information of one macroblock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbInfo {
    pub y_mode: IntraMode,
    pub uv_mode: IntraMode,
    /// Sub-block modes; filled from `y_mode` for whole-block luma modes
    pub sub_modes: [SubBlockMode; 16],
    pub ref_frame: RefFrame,
    pub inter_mode: Option<InterMode>,
    pub mv: MotionVector,
    pub skip: bool,
}

impl Default for MbInfo {
    fn default() -> Self {
        MbInfo {
            y_mode: IntraMode::Dc,
            uv_mode: IntraMode::Dc,
            sub_modes: [SubBlockMode::Dc; 16],
            ref_frame: RefFrame::Intra,
            inter_mode: None,
            mv: MotionVector::ZERO,
            skip: false,
        }
    }
}

impl MbInfo {
    /// Whether the luma DC coefficients travel in a Y2 block
    pub fn has_y2(&self) -> bool {
        match self.inter_mode {
            Some(mode) => mode != InterMode::Split,
            None => self.y_mode != IntraMode::BPred,
        }
    }

    pub fn is_inter(&self) -> bool {
        self.ref_frame != RefFrame::Intra
    }
}

/// Mode information for every macroblock of a frame
///
/// Positions outside the frame resolve to a sentinel: an intra macroblock
/// with DC modes everywhere and no motion.
#[derive(Debug, Clone, Default)]
pub struct MbGrid {
    cols: usize,
    rows: usize,
    infos: Vec<MbInfo>,
    sentinel: MbInfo,
}

impl MbGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        MbGrid {
            cols,
            rows,
            infos: vec![MbInfo::default(); cols * rows],
            sentinel: MbInfo::default(),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Whether a position lies inside the frame
    pub fn contains(&self, mbx: isize, mby: isize) -> bool {
        mbx >= 0 && mby >= 0 && (mbx as usize) < self.cols && (mby as usize) < self.rows
    }

    /// Macroblock at a possibly out-of-frame position
    pub fn neighbor(&self, mbx: isize, mby: isize) -> &MbInfo {
        if self.contains(mbx, mby) {
            &self.infos[mby as usize * self.cols + mbx as usize]
        } else {
            &self.sentinel
        }
    }

    pub fn at(&self, mbx: usize, mby: usize) -> &MbInfo {
        &self.infos[mby * self.cols + mbx]
    }

    pub fn at_mut(&mut self, mbx: usize, mby: usize) -> &mut MbInfo {
        &mut self.infos[mby * self.cols + mbx]
    }

    /// Sub-block mode context above sub-block `b` of macroblock (mbx, mby)
    pub fn above_sub_mode(&self, mbx: usize, mby: usize, b: usize) -> SubBlockMode {
        if b >= 4 {
            return self.at(mbx, mby).sub_modes[b - 4];
        }
        self.neighbor(mbx as isize, mby as isize - 1).sub_modes[b + 12]
    }

    /// Sub-block mode context left of sub-block `b` of macroblock (mbx, mby)
    pub fn left_sub_mode(&self, mbx: usize, mby: usize, b: usize) -> SubBlockMode {
        if b % 4 != 0 {
            return self.at(mbx, mby).sub_modes[b - 1];
        }
        self.neighbor(mbx as isize - 1, mby as isize).sub_modes[b + 3]
    }
}

/// Above/left trackers of which blocks produced tokens
#[derive(Debug, Clone)]
pub struct NonzeroContext {
    above: Vec<[bool; CONTEXT_SLOTS]>,
    left: [bool; CONTEXT_SLOTS],
}

impl NonzeroContext {
    pub fn new(mb_cols: usize) -> Self {
        NonzeroContext {
            above: vec![[false; CONTEXT_SLOTS]; mb_cols],
            left: [false; CONTEXT_SLOTS],
        }
    }

    /// Start a new macroblock row
    pub fn start_row(&mut self) {
        self.left = [false; CONTEXT_SLOTS];
    }

    /// Initial token context (0..=2) of block `block` in column `mbx`
    pub fn context(&self, mbx: usize, block: usize) -> usize {
        self.above[mbx][BLOCK_TO_ABOVE_ENT[block]] as usize
            + self.left[BLOCK_TO_LEFT_ENT[block]] as usize
    }

    /// Record whether block `block` in column `mbx` produced tokens
    pub fn set(&mut self, mbx: usize, block: usize, has_tokens: bool) {
        self.above[mbx][BLOCK_TO_ABOVE_ENT[block]] = has_tokens;
        self.left[BLOCK_TO_LEFT_ENT[block]] = has_tokens;
    }

    /// Reset the trackers for a macroblock coded without tokens
    ///
    /// The Y2 slots belong to the last macroblock that had a Y2 block, so
    /// they are only cleared when this one has one too.
    pub fn clear_macroblock(&mut self, mbx: usize, has_y2: bool) {
        let end = if has_y2 { CONTEXT_SLOTS } else { Y2_SLOT };
        self.above[mbx][..end].fill(false);
        self.left[..end].fill(false);
    }
}

/// Quantized levels of one macroblock, kept between analysis and coding
#[derive(Debug, Clone)]
pub struct MacroblockLevels {
    /// Blocks 0..16 luma, 16..20 U, 20..24 V, 24 Y2 (raster order levels)
    pub blocks: [[i32; 16]; 25],
    pub has_y2: bool,
}

impl MacroblockLevels {
    pub fn new(has_y2: bool) -> Self {
        MacroblockLevels {
            blocks: [[0; 16]; 25],
            has_y2,
        }
    }

    /// Whether no block has a coded coefficient, so the macroblock can skip
    /// its tokens entirely
    pub fn is_empty(&self) -> bool {
        let luma_first = if self.has_y2 { 1 } else { 0 };
        let luma_empty = self.blocks[..U_BLOCK_START]
            .iter()
            .all(|b| b[luma_first..].iter().all(|&v| v == 0));
        let chroma_empty = self.blocks[U_BLOCK_START..Y2_BLOCK]
            .iter()
            .all(|b| b.iter().all(|&v| v == 0));
        let y2_empty = !self.has_y2 || self.blocks[Y2_BLOCK].iter().all(|&v| v == 0);
        luma_empty && chroma_empty && y2_empty
    }
}
