//! Block-boundary and successor analysis over a decoded instruction stream
//!
//! The analyzer partitions the linear stream into basic blocks: a block
//! starts at offset 0, at every jump target, and at the byte following
//! every terminator or conditional jump. Successor edges are derived from
//! the last instruction of each block.

use crate::decoder::Inst;
use crate::opcodes::OpFlags;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeSet;

/// Result of control-flow analysis for one method body
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    /// Block-start byte offsets, ascending. Always contains 0 for a
    /// non-empty stream.
    pub boundaries: BTreeSet<usize>,
    /// Block start offset → successor block start offsets. For a
    /// conditional jump the branch target comes first, the fall-through
    /// second.
    pub successors: HashMap<usize, Vec<usize>>,
    /// Jump edges whose target does not land on an instruction start;
    /// reported by the lifter as warnings.
    pub invalid_edges: Vec<(usize, i64)>,
    /// Offset one past the last decoded instruction
    pub code_end: usize,
}

impl FlowGraph {
    pub fn analyze(insts: &[Inst]) -> Self {
        let mut graph = FlowGraph::default();
        if insts.is_empty() {
            return graph;
        }
        let code_end = insts.last().map(|i| i.end_offset()).unwrap_or(0);
        graph.code_end = code_end;

        let starts: HashSet<usize> = insts.iter().map(|i| i.offset).collect();
        graph.boundaries.insert(insts[0].offset);

        // First sweep: collect boundaries.
        for inst in insts {
            let flags = inst.flags();
            if flags.is_jump() {
                match inst.jump_target() {
                    Some(target) if target >= 0 && starts.contains(&(target as usize)) => {
                        graph.boundaries.insert(target as usize);
                    }
                    Some(target) => graph.invalid_edges.push((inst.offset, target)),
                    None => graph.invalid_edges.push((inst.offset, -1)),
                }
                // Fall-through after a conditional jump, next leader after
                // an unconditional one.
                if inst.end_offset() < code_end {
                    graph.boundaries.insert(inst.end_offset());
                }
            } else if flags.contains(OpFlags::TERMINATOR) && inst.end_offset() < code_end {
                graph.boundaries.insert(inst.end_offset());
            }
        }

        // Second sweep: the last instruction of each block decides its
        // successors.
        for inst in insts {
            let next_boundary = graph
                .boundaries
                .range(inst.offset + 1..)
                .next()
                .copied();
            let is_block_last = match next_boundary {
                Some(b) => inst.end_offset() == b || inst.end_offset() > b,
                None => true,
            };
            if !is_block_last && !inst.flags().ends_block() && !inst.flags().is_jump() {
                continue;
            }
            let block = graph.leader_of(inst.offset);
            let flags = inst.flags();
            let mut succs = Vec::new();
            if flags.contains(OpFlags::COND_JUMP) {
                if let Some(target) = inst.jump_target() {
                    if target >= 0 && graph.boundaries.contains(&(target as usize)) {
                        succs.push(target as usize);
                    }
                }
                if inst.end_offset() < code_end {
                    succs.push(inst.end_offset());
                }
            } else if flags.contains(OpFlags::UNCOND_JUMP) {
                if let Some(target) = inst.jump_target() {
                    if target >= 0 && graph.boundaries.contains(&(target as usize)) {
                        succs.push(target as usize);
                    }
                }
            } else if flags.contains(OpFlags::TERMINATOR) {
                // return or throw: no successors
            } else if let Some(b) = next_boundary {
                if inst.end_offset() == b {
                    succs.push(b);
                }
            }
            graph.successors.insert(block, succs);
        }

        // Blocks whose last instruction was not a control transfer and
        // that are followed by nothing keep an empty successor list.
        for &start in &graph.boundaries {
            graph.successors.entry(start).or_default();
        }

        graph
    }

    /// The block-start offset owning `offset`: the greatest boundary that
    /// is less than or equal to it.
    pub fn leader_of(&self, offset: usize) -> usize {
        self.boundaries
            .range(..=offset)
            .next_back()
            .copied()
            .unwrap_or(0)
    }

    /// Block start offsets in ascending order
    pub fn block_starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.boundaries.iter().copied()
    }

    pub fn successors_of(&self, start: usize) -> &[usize] {
        self.successors
            .get(&start)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn block_count(&self) -> usize {
        self.boundaries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_straight_line_single_block() {
        // ldai 1 ; sta v0 ; return
        let bytes = [0x07, 1, 0, 0, 0, 0x0a, 0, 0x60];
        let insts = Decoder::decode_all(&bytes);
        let graph = FlowGraph::analyze(&insts);
        assert_eq!(graph.block_count(), 1);
        assert_eq!(graph.successors_of(0), &[] as &[usize]);
    }

    #[test]
    fn test_conditional_jump_successor_order() {
        // 0: jeqz +4 (target 4) ; 2: jmp +2 (target 4) ; 4: return
        let bytes = [0x4f, 0x04, 0x4d, 0x02, 0x60];
        let insts = Decoder::decode_all(&bytes);
        let graph = FlowGraph::analyze(&insts);
        assert_eq!(
            graph.block_starts().collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        // Branch target first, fall-through second.
        assert_eq!(graph.successors_of(0), &[4, 2]);
        assert_eq!(graph.successors_of(2), &[4]);
        assert_eq!(graph.successors_of(4), &[] as &[usize]);
    }

    #[test]
    fn test_jump_target_arithmetic_is_instruction_relative() {
        // A two-byte jmp +2 at offset 10 targets offset 12.
        let mut bytes = vec![];
        for _ in 0..5 {
            bytes.extend_from_slice(&[0x0a, 0]); // sta v0, two bytes each
        }
        bytes.extend_from_slice(&[0x4d, 0x02]); // offset 10: jmp +2
        bytes.push(0x60); // offset 12: return
        let insts = Decoder::decode_all(&bytes);
        let graph = FlowGraph::analyze(&insts);
        assert!(graph.boundaries.contains(&12));
        assert_eq!(graph.successors_of(0), &[12]);
    }

    #[test]
    fn test_loop_back_edge() {
        // 0: ldai 0        (5 bytes)
        // 5: jeqz +6       target 11
        // 7: inc           (2 bytes)
        // 9: jmp -9        target 0
        // 11: return
        let bytes = [
            0x07, 0, 0, 0, 0, // ldai 0
            0x4f, 0x06, // jeqz +6
            0x32, 0x00, // inc
            0x4d, 0xf7, // jmp -9
            0x60, // return
        ];
        let insts = Decoder::decode_all(&bytes);
        let graph = FlowGraph::analyze(&insts);
        assert_eq!(graph.block_starts().collect::<Vec<_>>(), vec![0, 7, 11]);
        assert_eq!(graph.successors_of(0), &[11, 7]);
        assert_eq!(graph.successors_of(7), &[0]);
    }

    #[test]
    fn test_code_after_return_is_a_new_block() {
        // return ; ldai 5 ; return
        let bytes = [0x61, 0x07, 5, 0, 0, 0, 0x60];
        let insts = Decoder::decode_all(&bytes);
        let graph = FlowGraph::analyze(&insts);
        assert_eq!(graph.block_starts().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(graph.successors_of(0), &[] as &[usize]);
    }

    #[test]
    fn test_invalid_jump_target_is_recorded() {
        // jmp +100 lands outside the body
        let bytes = [0x4d, 100, 0x60];
        let insts = Decoder::decode_all(&bytes);
        let graph = FlowGraph::analyze(&insts);
        assert_eq!(graph.invalid_edges, vec![(0, 100)]);
        assert_eq!(graph.successors_of(0), &[] as &[usize]);
    }

    #[test]
    fn test_empty_stream() {
        let graph = FlowGraph::analyze(&[]);
        assert_eq!(graph.block_count(), 0);
    }
}
