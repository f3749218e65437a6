//! Structural edge planning from indentation.
//!
//! Edges are always recomputed from the full note sequence. A stack of
//! `(indentation, fingerprint)` holds the open branches; a note's parent is
//! the nearest open note with strictly smaller indentation.

use crate::model::fingerprint::Fingerprint;
use crate::model::graph::StructuralEdge;
use crate::model::note::Note;

/// Computes every parent -> child edge for `notes` in source order.
pub fn plan_structural_edges(notes: &[Note]) -> Vec<StructuralEdge> {
    let mut stack: Vec<(usize, &Fingerprint)> = Vec::new();
    let mut edges = Vec::new();

    for note in notes {
        while stack
            .last()
            .is_some_and(|(indentation, _)| *indentation >= note.indentation)
        {
            stack.pop();
        }

        if let Some((_, parent)) = stack.last() {
            edges.push(StructuralEdge {
                parent: (*parent).clone(),
                child: note.fingerprint.clone(),
            });
        }

        stack.push((note.indentation, &note.fingerprint));
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::plan_structural_edges;
    use crate::model::fingerprint::Fingerprint;
    use crate::model::graph::StructuralEdge;
    use crate::parser::outline::parse_outline;

    fn edge(parent: &str, child: &str) -> StructuralEdge {
        StructuralEdge {
            parent: Fingerprint::of_line(parent),
            child: Fingerprint::of_line(child),
        }
    }

    #[test]
    fn builds_edges_for_mixed_depths() {
        let parsed = parse_outline("A\n  B\n    C\n  D\nE\n");
        let edges = plan_structural_edges(&parsed.notes);
        assert_eq!(edges, vec![edge("A", "B"), edge("B", "C"), edge("A", "D")]);
        assert!(!edges.iter().any(|e| e.child == Fingerprint::of_line("E")));
    }

    #[test]
    fn dedent_past_several_levels_attaches_to_nearest_shallower_note() {
        let parsed = parse_outline("A\n   B\n      C\n  D\n");
        let edges = plan_structural_edges(&parsed.notes);
        assert_eq!(edges, vec![edge("A", "B"), edge("B", "C"), edge("A", "D")]);
    }

    #[test]
    fn leading_indented_note_has_no_parent() {
        let parsed = parse_outline("    orphan\nroot\n  child\n");
        let edges = plan_structural_edges(&parsed.notes);
        assert_eq!(edges, vec![edge("root", "child")]);
    }

    #[test]
    fn siblings_share_parent() {
        let parsed = parse_outline("P\n  x\n  y\n  z\n");
        let edges = plan_structural_edges(&parsed.notes);
        assert_eq!(
            edges,
            vec![edge("P", "x"), edge("P", "y"), edge("P", "z")]
        );
    }
}
