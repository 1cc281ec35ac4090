//! Open-code source position tracking and snapshots.
//!
//! A snapshot is the minimum state needed to restart open-code processing
//! at a prior point: the instruction location, begin/end indices of the
//! current statement, the end line, and the whole copy-frame stack. Jumps
//! to open-code sequence symbols restore exactly this state.

use hlac_util::span::Location;
use hlac_util::Id;

/// Position in the open-code input: line plus byte offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourcePosition {
    pub file_line: usize,
    pub file_offset: usize,
}

impl SourcePosition {
    pub fn new(file_line: usize, file_offset: usize) -> Self {
        Self {
            file_line,
            file_offset,
        }
    }
}

/// One copy member invocation in the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyFrame {
    pub copy_member: Id,
    pub statement_offset: usize,
}

impl CopyFrame {
    pub fn new(copy_member: Id, statement_offset: usize) -> Self {
        Self {
            copy_member,
            statement_offset,
        }
    }
}

/// Snapshot of the source context. Equality is component-wise.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub instruction: Location,
    pub begin_index: usize,
    pub end_index: usize,
    pub end_line: usize,
    pub copy_frames: Vec<CopyFrame>,
}

/// Live source context of the open code.
#[derive(Clone, Debug, Default)]
pub struct SourceContext {
    /// Location of the instruction field of the current statement.
    pub current_instruction: Location,
    /// Byte offset where the current statement begins.
    pub begin_index: usize,
    /// Line where the current statement begins.
    pub begin_line: usize,
    /// Byte offset just past the current statement.
    pub end_index: usize,
    /// Line just past the current statement.
    pub end_line: usize,
    /// Active copy-frame stack, outermost first.
    pub copy_stack: Vec<CopyFrame>,
}

impl SourceContext {
    /// Snapshot of the current state.
    pub fn create_snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            instruction: self.current_instruction,
            begin_index: self.begin_index,
            end_index: self.end_index,
            end_line: self.end_line,
            copy_frames: self.copy_stack.clone(),
        }
    }

    /// Snapshot anchored at the *start* of the current statement; the
    /// state a jump to a label on this statement must restore.
    ///
    /// For a statement inside a copy member the file position points
    /// *after* the COPY statement (the member expansion resumes from the
    /// restored frames; the file resumes only once they exhaust), and the
    /// top frame's offset is pulled back so the labeled statement is
    /// re-delivered.
    pub fn create_begin_snapshot(&self) -> (SourcePosition, SourceSnapshot) {
        let mut snapshot = self.create_snapshot();
        let position = if self.copy_stack.is_empty() {
            snapshot.end_index = self.begin_index;
            SourcePosition::new(self.begin_line, self.begin_index)
        } else {
            if let Some(top) = snapshot.copy_frames.last_mut() {
                top.statement_offset = top.statement_offset.saturating_sub(1);
            }
            SourcePosition::new(self.end_line, self.end_index)
        };
        (position, snapshot)
    }

    /// Snapshot anchored *after* the current statement; where processing
    /// resumes when a lookahead fails.
    pub fn create_end_snapshot(&self) -> (SourcePosition, SourceSnapshot) {
        (
            SourcePosition::new(self.end_line, self.end_index),
            self.create_snapshot(),
        )
    }

    /// Restore a previously taken snapshot.
    pub fn apply_snapshot(&mut self, snapshot: SourceSnapshot) {
        self.current_instruction = snapshot.instruction;
        self.begin_index = snapshot.begin_index;
        self.end_index = snapshot.end_index;
        self.end_line = snapshot.end_line;
        self.copy_stack = snapshot.copy_frames;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trip() {
        let mut ctx = SourceContext {
            begin_index: 120,
            end_index: 160,
            end_line: 4,
            ..Default::default()
        };
        ctx.copy_stack.push(CopyFrame::new(Id::intern("CPY1"), 2));

        let snap = ctx.create_snapshot();
        let mut other = SourceContext::default();
        other.apply_snapshot(snap.clone());
        assert_eq!(other.create_snapshot(), snap);
    }

    #[test]
    fn test_snapshot_equality_is_componentwise() {
        let a = SourceSnapshot {
            begin_index: 1,
            end_index: 2,
            end_line: 3,
            copy_frames: vec![CopyFrame::new(Id::intern("M"), 0)],
            ..Default::default()
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.copy_frames[0].statement_offset = 1;
        assert_ne!(a, b);
    }

    #[test]
    fn test_begin_snapshot_points_at_statement_start() {
        let ctx = SourceContext {
            begin_index: 100,
            end_index: 140,
            end_line: 7,
            ..Default::default()
        };
        let (pos, snap) = ctx.create_begin_snapshot();
        assert_eq!(pos.file_offset, 100);
        assert_eq!(snap.end_index, 100);
    }

    #[test]
    fn test_begin_snapshot_inside_copy_member() {
        let mut ctx = SourceContext {
            begin_index: 100,
            end_index: 140,
            end_line: 7,
            ..Default::default()
        };
        // The member statement at offset 3 was just delivered (offset
        // already advanced to 4).
        ctx.copy_stack.push(CopyFrame::new(Id::intern("MEM"), 4));

        let (pos, snap) = ctx.create_begin_snapshot();
        // File resumes after the COPY statement...
        assert_eq!(pos.file_offset, 140);
        // ...and the member re-delivers the labeled statement.
        assert_eq!(snap.copy_frames[0].statement_offset, 3);
    }
}
