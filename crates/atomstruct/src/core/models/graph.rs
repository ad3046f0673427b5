use slotmap::{Key, SecondaryMap, SlotMap};

/// An edge payload that knows which two vertices it joins.
pub trait Edge<VK: Key> {
    fn endpoints(&self) -> [VK; 2];

    fn contains(&self, vertex: VK) -> bool {
        self.endpoints().contains(&vertex)
    }
}

/// Keeps a slot map together with the insertion order of its live keys.
#[derive(Debug, Clone)]
pub(crate) struct OrderedArena<K: Key, T> {
    items: SlotMap<K, T>,
    order: Vec<K>,
    positions: SecondaryMap<K, usize>,
}

impl<K: Key, T> Default for OrderedArena<K, T> {
    fn default() -> Self {
        Self {
            items: SlotMap::with_key(),
            order: Vec::new(),
            positions: SecondaryMap::new(),
        }
    }
}

impl<K: Key, T> OrderedArena<K, T> {
    pub(crate) fn insert(&mut self, item: T) -> K {
        let key = self.items.insert(item);
        self.positions.insert(key, self.order.len());
        self.order.push(key);
        key
    }

    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        let item = self.items.remove(key)?;
        if let Some(pos) = self.positions.remove(key) {
            self.order.remove(pos);
            for &later in &self.order[pos..] {
                self.positions[later] -= 1;
            }
        }
        Some(item)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.order.iter().map(move |&k| (k, &self.items[k]))
    }

    pub(crate) fn get(&self, key: K) -> Option<&T> {
        self.items.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.order
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// A generic undirected graph that owns its vertices and edges.
///
/// Both vertices and edges are addressed by slot-map handles that stay valid until that very
/// entity is deleted, and both are iterated in insertion order. Deleting a vertex does not
/// touch its edges; callers owning the domain semantics cascade first.
#[derive(Debug, Clone)]
pub struct Graph<VK: Key, V, EK: Key, E> {
    vertices: OrderedArena<VK, V>,
    edges: OrderedArena<EK, E>,
}

impl<VK: Key, V, EK: Key, E> Default for Graph<VK, V, EK, E> {
    fn default() -> Self {
        Self {
            vertices: OrderedArena::default(),
            edges: OrderedArena::default(),
        }
    }
}

impl<VK: Key, V, EK: Key, E: Edge<VK>> Graph<VK, V, EK, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, vertex: V) -> VK {
        self.vertices.insert(vertex)
    }

    /// Appends an edge. Returns `None` if either endpoint is not a vertex of this graph.
    pub fn add_edge(&mut self, edge: E) -> Option<EK> {
        let [a, b] = edge.endpoints();
        if !self.contains_vertex(a) || !self.contains_vertex(b) {
            return None;
        }
        Some(self.edges.insert(edge))
    }

    pub fn delete_vertex(&mut self, key: VK) -> Option<V> {
        self.vertices.remove(key)
    }

    pub fn delete_edge(&mut self, key: EK) -> Option<E> {
        self.edges.remove(key)
    }

    #[inline]
    pub fn vertex(&self, key: VK) -> Option<&V> {
        self.vertices.items.get(key)
    }

    #[inline]
    pub fn vertex_mut(&mut self, key: VK) -> Option<&mut V> {
        self.vertices.items.get_mut(key)
    }

    #[inline]
    pub fn edge(&self, key: EK) -> Option<&E> {
        self.edges.items.get(key)
    }

    #[inline]
    pub fn edge_mut(&mut self, key: EK) -> Option<&mut E> {
        self.edges.items.get_mut(key)
    }

    pub fn contains_vertex(&self, key: VK) -> bool {
        self.vertices.items.contains_key(key)
    }

    pub fn contains_edge(&self, key: EK) -> bool {
        self.edges.items.contains_key(key)
    }

    /// Vertex handles in insertion order.
    pub fn vertex_ids(&self) -> &[VK] {
        &self.vertices.order
    }

    /// Edge handles in insertion order.
    pub fn edge_ids(&self) -> &[EK] {
        &self.edges.order
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VK, &V)> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EK, &E)> {
        self.edges.iter()
    }

    /// Position of a vertex in the insertion order, counting only live vertices.
    pub fn vertex_index(&self, key: VK) -> Option<usize> {
        self.vertices.positions.get(key).copied()
    }

    pub fn edge_index(&self, key: EK) -> Option<usize> {
        self.edges.positions.get(key).copied()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.order.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::new_key_type;

    new_key_type! {
        struct V;
        struct E;
    }

    #[derive(Debug, PartialEq)]
    struct Link(V, V);

    impl Edge<V> for Link {
        fn endpoints(&self) -> [V; 2] {
            [self.0, self.1]
        }
    }

    fn path_graph(n: usize) -> (Graph<V, &'static str, E, Link>, Vec<V>, Vec<E>) {
        let names = ["a", "b", "c", "d", "e"];
        let mut graph = Graph::new();
        let vs: Vec<V> = names[..n].iter().map(|&s| graph.add_vertex(s)).collect();
        let es: Vec<E> = vs
            .windows(2)
            .map(|w| graph.add_edge(Link(w[0], w[1])).unwrap())
            .collect();
        (graph, vs, es)
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let (graph, vs, es) = path_graph(5);
        let names: Vec<&str> = graph.vertices().map(|(_, v)| *v).collect();
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
        assert_eq!(graph.vertex_ids(), vs.as_slice());
        assert_eq!(graph.edge_ids(), es.as_slice());
        assert_eq!(graph.num_vertices(), 5);
        assert_eq!(graph.num_edges(), 4);
    }

    #[test]
    fn deleting_a_vertex_keeps_other_handles_valid() {
        let (mut graph, vs, _) = path_graph(5);
        assert_eq!(graph.delete_vertex(vs[1]), Some("b"));

        assert!(graph.vertex(vs[1]).is_none());
        assert_eq!(graph.vertex(vs[0]), Some(&"a"));
        assert_eq!(graph.vertex(vs[4]), Some(&"e"));
        let names: Vec<&str> = graph.vertices().map(|(_, v)| *v).collect();
        assert_eq!(names, ["a", "c", "d", "e"]);
    }

    #[test]
    fn positions_compact_after_deletion() {
        let (mut graph, vs, _) = path_graph(4);
        assert_eq!(graph.vertex_index(vs[3]), Some(3));
        graph.delete_vertex(vs[0]);
        assert_eq!(graph.vertex_index(vs[0]), None);
        assert_eq!(graph.vertex_index(vs[1]), Some(0));
        assert_eq!(graph.vertex_index(vs[3]), Some(2));
    }

    #[test]
    fn vertex_deletion_does_not_cascade_to_edges() {
        let (mut graph, vs, es) = path_graph(3);
        graph.delete_vertex(vs[1]);
        assert_eq!(graph.num_edges(), 2);
        assert!(graph.edge(es[0]).unwrap().contains(vs[1]));
    }

    #[test]
    fn edge_deletion_and_unknown_handles() {
        let (mut graph, vs, es) = path_graph(3);
        assert_eq!(graph.delete_edge(es[0]), Some(Link(vs[0], vs[1])));
        assert!(graph.delete_edge(es[0]).is_none());
        assert_eq!(graph.edge_index(es[1]), Some(0));
        graph.delete_vertex(vs[2]);
        assert!(graph.delete_vertex(vs[2]).is_none());
        assert!(graph.add_edge(Link(vs[0], vs[2])).is_none());
    }
}
