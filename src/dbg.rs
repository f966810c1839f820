use std::collections::{BTreeSet, HashMap};
use std::fmt;

// Nodes are k-mers. There is an arc v -> u if u's k-mer equals v's k-mer
// shifted right by one base and the two were observed adjacent in a read
// (or in the reverse complement of a read). Node ids are indices into
// `nodes`; deleted nodes leave a tombstone behind so that the ids of the
// survivors stay stable. Ids are never reused.

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    EmptyInput,
    KTooLarge { k: usize, read_len: usize },
    InvalidBase(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "no reads supplied"),
            Error::KTooLarge { k, read_len } => {
                write!(f, "k-mer length {} exceeds first read length {}", k, read_len)
            }
            Error::InvalidBase(b) => {
                write!(f, "invalid nucleotide '{}' (expected A, C, G or T)", *b as char)
            }
        }
    }
}

impl std::error::Error for Error {}

pub fn reverse_complement(seq: &[u8]) -> Result<Vec<u8>, Error> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => Ok(b'T'),
            b'T' => Ok(b'A'),
            b'C' => Ok(b'G'),
            b'G' => Ok(b'C'),
            other => Err(Error::InvalidBase(other)),
        })
        .collect()
}

struct Node {
    kmer: Vec<u8>,
    children: BTreeSet<usize>,
    count: usize,

    // Traversal state, valid only within one longest-path query
    visited: bool,
    depth: usize,
    best_child: Option<usize>,
}

impl Node {
    fn new(kmer: Vec<u8>) -> Self {
        Node {
            kmer,
            children: BTreeSet::new(),
            count: 0,
            visited: false,
            depth: 0,
            best_child: None,
        }
    }

    fn reset(&mut self) {
        self.visited = false;
        self.depth = 0;
        self.best_child = None;
    }
}

// One frame of the explicit DFS stack. Reachable paths routinely outgrow
// the native call stack on genomic inputs, so the traversal may not recurse.
struct Frame {
    id: usize,
    children: Vec<usize>,
    next: usize,
    max_depth: usize,
    best_child: Option<usize>,
}

pub struct Dbg {
    k: usize,
    nodes: Vec<Option<Node>>,
    kmer_to_id: HashMap<Vec<u8>, usize>,
}

impl Dbg {
    pub fn new(k: usize, read_groups: &[Vec<Vec<u8>>]) -> Result<Dbg, Error> {
        let first_read = read_groups
            .first()
            .and_then(|group| group.first())
            .ok_or(Error::EmptyInput)?;
        if k > first_read.len() {
            return Err(Error::KTooLarge { k, read_len: first_read.len() });
        }

        let mut dbg = Dbg::empty(k);
        for group in read_groups {
            for read in group {
                let rc = reverse_complement(read)?;
                // The upper bound skips the final (k, k+1)-window pair of
                // every read, so the k-mer at position len-k never becomes
                // a node. Downstream node and arc sets depend on this bound.
                for i in 0..read.len().saturating_sub(k + 1) {
                    dbg.add_arc(&read[i..i + k], &read[i + 1..i + 1 + k]);
                    dbg.add_arc(&rc[i..i + k], &rc[i + 1..i + 1 + k]);
                }
            }
        }
        log::info!(
            "Built de Bruijn graph with {} nodes from {} read group(s)",
            dbg.node_count(),
            read_groups.len()
        );
        Ok(dbg)
    }

    fn empty(k: usize) -> Dbg {
        Dbg { k, nodes: Vec::new(), kmer_to_id: HashMap::new() }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn node_count(&self) -> usize {
        self.kmer_to_id.len()
    }

    pub fn contains(&self, kmer: &[u8]) -> bool {
        self.kmer_to_id.contains_key(kmer)
    }

    // Number of live nodes per occurrence count, indexed by count
    pub fn count_histogram(&self) -> Vec<usize> {
        let mut histogram = Vec::new();
        for id in self.live_ids() {
            let count = self.node(id).count;
            if histogram.len() <= count {
                histogram.resize(count + 1, 0);
            }
            histogram[count] += 1;
        }
        histogram
    }

    // One extraction round: find the longest remaining path, splice its
    // sequence together and delete its nodes. Returns an empty sequence
    // once the graph is exhausted; that is the stop signal, not an error.
    pub fn next_contig(&mut self) -> Vec<u8> {
        let path = self.longest_path();
        let contig = self.concat_path(&path);
        self.delete_path(&path);
        contig
    }

    fn node(&self, id: usize) -> &Node {
        self.nodes[id].as_ref().unwrap()
    }

    fn node_mut(&mut self, id: usize) -> &mut Node {
        self.nodes[id].as_mut().unwrap()
    }

    fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
    }

    fn add_node(&mut self, kmer: &[u8]) -> usize {
        let id = match self.kmer_to_id.get(kmer) {
            Some(&id) => id,
            None => {
                let id = self.nodes.len();
                self.kmer_to_id.insert(kmer.to_vec(), id);
                self.nodes.push(Some(Node::new(kmer.to_vec())));
                id
            }
        };
        self.node_mut(id).count += 1;
        id
    }

    fn add_arc(&mut self, kmer1: &[u8], kmer2: &[u8]) {
        let v = self.add_node(kmer1);
        let u = self.add_node(kmer2);
        self.node_mut(v).children.insert(u);
    }

    // Children of `id` by descending occurrence count. The sort is stable
    // over the ascending-id set order, so equal-count children keep a
    // deterministic order.
    fn sorted_children(&self, id: usize) -> Vec<usize> {
        let mut children: Vec<usize> = self.node(id).children.iter().copied().collect();
        children.sort_by(|&a, &b| self.node(b).count.cmp(&self.node(a).count));
        children
    }

    fn reset(&mut self) {
        for slot in self.nodes.iter_mut() {
            if let Some(node) = slot {
                node.reset();
            }
        }
    }

    fn frame(&self, id: usize) -> Frame {
        Frame {
            id,
            children: self.sorted_children(id),
            next: 0,
            max_depth: 0,
            best_child: None,
        }
    }

    // Memoized longest-path DFS from `root`. A node is marked visited
    // before its children are explored, and a revisited child contributes
    // whatever depth it currently caches. For a child still on the active
    // DFS path that cached depth is the unfinalized 0, which bounds cycles
    // instead of following them forever. Changing this also changes which
    // contig is picked as longest, so it stays as-is.
    fn fill_depth(&mut self, root: usize) {
        if self.node(root).visited {
            return;
        }
        self.node_mut(root).visited = true;
        let mut stack = vec![self.frame(root)];

        while !stack.is_empty() {
            let next_child = {
                let top = stack.last_mut().unwrap();
                if top.next < top.children.len() {
                    top.next += 1;
                    Some(top.children[top.next - 1])
                } else {
                    None
                }
            };

            match next_child {
                Some(child) if self.node(child).visited => {
                    let depth = self.node(child).depth;
                    let top = stack.last_mut().unwrap();
                    if depth > top.max_depth {
                        top.max_depth = depth;
                        top.best_child = Some(child);
                    }
                }
                Some(child) => {
                    self.node_mut(child).visited = true;
                    let frame = self.frame(child);
                    stack.push(frame);
                }
                None => {
                    let done = stack.pop().unwrap();
                    let depth = done.max_depth + 1;
                    let node = self.node_mut(done.id);
                    node.depth = depth;
                    node.best_child = done.best_child;
                    if let Some(parent) = stack.last_mut() {
                        if depth > parent.max_depth {
                            parent.max_depth = depth;
                            parent.best_child = Some(done.id);
                        }
                    }
                }
            }
        }
    }

    // Roots the path at the globally deepest node, then follows the chosen
    // successors down to a tip. Strict comparison means the lowest node id
    // wins depth ties. Empty graph gives an empty path.
    fn longest_path(&mut self) -> Vec<usize> {
        self.reset();

        let mut max_depth = 0;
        let mut root = None;
        let ids: Vec<usize> = self.live_ids().collect();
        for id in ids {
            self.fill_depth(id);
            let depth = self.node(id).depth;
            if depth > max_depth {
                max_depth = depth;
                root = Some(id);
            }
        }

        let mut path = Vec::new();
        let mut cursor = root;
        while let Some(id) = cursor {
            path.push(id);
            cursor = self.node(id).best_child;
        }
        path
    }

    // Consecutive path nodes overlap in k-1 bases, so each node after the
    // first contributes only its final base.
    fn concat_path(&self, path: &[usize]) -> Vec<u8> {
        if path.is_empty() {
            return Vec::new();
        }
        let mut contig = self.node(path[0]).kmer.clone();
        for &id in &path[1..] {
            contig.push(*self.node(id).kmer.last().unwrap());
        }
        contig
    }

    fn delete_path(&mut self, path: &[usize]) {
        for &id in path {
            if let Some(node) = self.nodes[id].take() {
                self.kmer_to_id.remove(&node.kmer);
            }
        }

        // Full scan to strip dangling child references. O(live nodes) per
        // extraction; the hotspot of the whole assembler.
        let deleted: BTreeSet<usize> = path.iter().copied().collect();
        for slot in self.nodes.iter_mut() {
            if let Some(node) = slot {
                node.children.retain(|child| !deleted.contains(child));
            }
        }
    }
}
