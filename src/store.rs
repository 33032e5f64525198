use crate::entities::{Coordinate, Point};

#[derive(Debug, Default)]
pub struct GeometryStore {
    entries: Vec<Entry>,
    next_seq: u64,
    revision: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    coordinate: Coordinate,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hydrated(coordinates: Vec<Coordinate>) -> Self {
        let mut store = Self::new();
        store.hydrate(coordinates);
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn append(&mut self, point: Point) -> Coordinate {
        let ordering = self
            .entries
            .iter()
            .map(|e| e.coordinate.ordering)
            .max()
            .map(|max| max.saturating_add(1))
            .unwrap_or(0);

        let coordinate = Coordinate::new(ordering, point);
        self.push(coordinate.clone());
        self.revision += 1;

        coordinate
    }

    /// Removes the entry at `index` of the sorted sequence. Out of range is
    /// a no-op returning `None`.
    pub fn remove_at(&mut self, index: usize) -> Option<Coordinate> {
        let seq = self.sorted_entries().get(index).map(|e| e.seq)?;
        let position = self.entries.iter().position(|e| e.seq == seq)?;

        self.revision += 1;

        Some(self.entries.remove(position).coordinate)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.revision += 1;
    }

    pub fn hydrate(&mut self, coordinates: Vec<Coordinate>) {
        self.entries.clear();
        for coordinate in coordinates {
            self.push(coordinate);
        }
        self.revision += 1;
    }

    pub fn snapshot(&self) -> Vec<Coordinate> {
        self.sorted_entries()
            .into_iter()
            .map(|e| e.coordinate.clone())
            .collect()
    }

    fn push(&mut self, coordinate: Coordinate) {
        self.entries.push(Entry {
            seq: self.next_seq,
            coordinate,
        });
        self.next_seq += 1;
    }

    fn sorted_entries(&self) -> Vec<&Entry> {
        let mut sorted: Vec<&Entry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| (e.coordinate.ordering, e.seq));
        sorted
    }
}

#[cfg(test)]
fn point(lat: f64, lng: f64) -> Point {
    Point::new(lat, lng).unwrap()
}

#[test]
fn append_assigns_increasing_orderings_test() {
    let mut store = GeometryStore::new();

    let a = store.append(point(-6.2, 106.8));
    let b = store.append(point(-6.21, 106.82));
    let c = store.append(point(-6.19, 106.85));

    assert_eq!((a.ordering, b.ordering, c.ordering), (0, 1, 2));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0], a);
    assert_eq!(snapshot[2], c);
}

#[test]
fn append_continues_after_hydrated_max_test() {
    let mut store = GeometryStore::hydrated(vec![
        Coordinate::persisted(1, 10, "-6.1,106.7"),
        Coordinate::persisted(2, 4, "-6.2,106.8"),
    ]);

    let appended = store.append(point(-6.3, 106.9));

    assert_eq!(appended.ordering, 11);
    assert_eq!(store.snapshot().last(), Some(&appended));
}

#[test]
fn hydrate_sorts_by_ordering_test() {
    let store = GeometryStore::hydrated(vec![
        Coordinate::persisted(1, 2, "-6.3,106.9"),
        Coordinate::persisted(2, 0, "-6.1,106.7"),
        Coordinate::persisted(3, 1, "-6.2,106.8"),
    ]);

    let texts: Vec<String> = store
        .snapshot()
        .into_iter()
        .map(|c| c.coordinates)
        .collect();

    assert_eq!(texts, vec!["-6.1,106.7", "-6.2,106.8", "-6.3,106.9"]);
}

#[test]
fn hydrate_breaks_ties_by_insertion_test() {
    let store = GeometryStore::hydrated(vec![
        Coordinate::persisted(1, 5, "1,1"),
        Coordinate::persisted(2, 5, "2,2"),
        Coordinate::persisted(3, 0, "3,3"),
    ]);

    let ids: Vec<Option<i64>> = store.snapshot().into_iter().map(|c| c.id).collect();

    assert_eq!(ids, vec![Some(3), Some(1), Some(2)]);
}

#[test]
fn remove_at_uses_sorted_position_test() {
    let mut store = GeometryStore::hydrated(vec![
        Coordinate::persisted(1, 2, "-6.3,106.9"),
        Coordinate::persisted(2, 0, "-6.1,106.7"),
        Coordinate::persisted(3, 1, "-6.2,106.8"),
    ]);

    let removed = store.remove_at(1).unwrap();

    assert_eq!(removed.id, Some(3));
    assert_eq!(store.len(), 2);
    assert_eq!(store.snapshot()[1].id, Some(1));
}

#[test]
fn remove_at_out_of_range_is_noop_test() {
    let mut store = GeometryStore::new();
    assert!(store.remove_at(0).is_none());

    store.append(point(1.0, 1.0));
    let revision = store.revision();

    assert!(store.remove_at(1).is_none());
    assert!(store.remove_at(usize::MAX).is_none());
    assert_eq!(store.len(), 1);
    assert_eq!(store.revision(), revision);
}

#[test]
fn clear_empties_store_test() {
    let mut store = GeometryStore::new();
    store.append(point(1.0, 1.0));
    store.append(point(2.0, 2.0));

    store.clear();

    assert!(store.is_empty());
    assert_eq!(store.append(point(3.0, 3.0)).ordering, 0);
}

#[test]
fn append_after_max_ordering_stays_last_test() {
    let mut store = GeometryStore::hydrated(vec![
        Coordinate::persisted(1, 0, "0,0"),
        Coordinate::persisted(2, i64::MAX, "1,1"),
    ]);

    let appended = store.append(point(2.0, 2.0));
    let snapshot = store.snapshot();

    assert_eq!(appended.ordering, i64::MAX);
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[1].id, Some(2));
    assert_eq!(snapshot[2].coordinates, "2.000000,2.000000");
}
