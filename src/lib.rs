pub mod dbg;

use log::info;
use dbg::Dbg;

// Drains the graph contig by contig, longest remaining path first, up to
// `max_contigs`. The graph is consumed destructively: every emitted contig
// deletes its nodes. An empty contig means the graph is exhausted.
pub fn assemble(graph: &mut Dbg, max_contigs: usize) -> Vec<Vec<u8>> {
    let mut contigs = Vec::new();
    for i in 0..max_contigs {
        let contig = graph.next_contig();
        if contig.is_empty() {
            info!("Graph exhausted after {} contig(s)", i);
            break;
        }
        info!(
            "Contig {}: {} bp, {} node(s) remaining",
            i,
            contig.len(),
            graph.node_count()
        );
        contigs.push(contig);
    }
    contigs
}
