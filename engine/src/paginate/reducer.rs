//! Incremental reducers
//!
//! Each reducer folds rows page by page. State size is bounded by the
//! reducer's output: a counter, a running sum, an n-element heap, a capped
//! row buffer, or a distinct set capped at the result cap.

use super::{coerce_number, value_at_path};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::BTreeSet;

/// Sort direction for `top_n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Reduction applied across all pages of a walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reducer {
    /// Concatenate rows up to the result cap
    Collect,

    /// Count rows that pass the filter
    Count,

    /// Sum a numeric field
    Sum { field: String },

    /// Minimum of a numeric field
    Min { field: String },

    /// Maximum of a numeric field
    Max { field: String },

    /// The n rows with the largest (desc) or smallest (asc) field value
    TopN {
        field: String,
        n: usize,
        direction: SortDirection,
    },

    /// Distinct values of a field
    Distinct { field: String },
}

/// Entry in the bounded top-N heap, ordered by key.
struct HeapEntry {
    key: f64,
    row: serde_json::Value,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key.total_cmp(&other.key) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.total_cmp(&other.key)
    }
}

/// Incremental reducer state. `push` folds one row; `finish` materializes
/// the reduced rows.
pub enum ReducerState {
    Collect {
        rows: Vec<serde_json::Value>,
        cap: usize,
    },
    Count {
        count: u64,
    },
    Sum {
        field: String,
        sum: f64,
        counted: u64,
    },
    Extreme {
        field: String,
        minimum: bool,
        value: Option<f64>,
    },
    /// Keeps the n best rows. For descending order the heap root is the
    /// current worst of the best, so it can be evicted in O(log n).
    TopN {
        field: String,
        n: usize,
        direction: SortDirection,
        heap: BinaryHeap<std::cmp::Reverse<HeapEntry>>,
        heap_desc: BinaryHeap<HeapEntry>,
    },
    Distinct {
        field: String,
        values: BTreeSet<String>,
        cap: usize,
    },
}

impl ReducerState {
    pub fn new(reducer: &Reducer, result_cap: usize) -> Self {
        match reducer {
            Reducer::Collect => ReducerState::Collect {
                rows: Vec::new(),
                cap: result_cap,
            },
            Reducer::Count => ReducerState::Count { count: 0 },
            Reducer::Sum { field } => ReducerState::Sum {
                field: field.clone(),
                sum: 0.0,
                counted: 0,
            },
            Reducer::Min { field } => ReducerState::Extreme {
                field: field.clone(),
                minimum: true,
                value: None,
            },
            Reducer::Max { field } => ReducerState::Extreme {
                field: field.clone(),
                minimum: false,
                value: None,
            },
            Reducer::TopN {
                field,
                n,
                direction,
            } => ReducerState::TopN {
                field: field.clone(),
                n: (*n).min(result_cap).max(1),
                direction: *direction,
                heap: BinaryHeap::new(),
                heap_desc: BinaryHeap::new(),
            },
            Reducer::Distinct { field } => ReducerState::Distinct {
                field: field.clone(),
                values: BTreeSet::new(),
                cap: result_cap,
            },
        }
    }

    /// Fold one row. Returns true when the state is saturated and scanning
    /// further rows cannot change the output (collector cap reached).
    pub fn push(&mut self, row: &serde_json::Value) -> bool {
        match self {
            ReducerState::Collect { rows, cap } => {
                // Saturation is signalled only when a row is actually
                // dropped, so a walk that ends exactly at the cap is not
                // labeled truncated.
                if rows.len() >= *cap {
                    return true;
                }
                rows.push(row.clone());
                false
            }
            ReducerState::Count { count } => {
                *count += 1;
                false
            }
            ReducerState::Sum { field, sum, counted } => {
                let v = value_at_path(row, field).and_then(coerce_number).unwrap_or(0.0);
                *sum += v;
                *counted += 1;
                false
            }
            ReducerState::Extreme {
                field,
                minimum,
                value,
            } => {
                if let Some(v) = value_at_path(row, field).and_then(coerce_number) {
                    *value = Some(match *value {
                        None => v,
                        Some(current) if *minimum => current.min(v),
                        Some(current) => current.max(v),
                    });
                }
                false
            }
            ReducerState::TopN {
                field,
                n,
                direction,
                heap,
                heap_desc,
            } => {
                let key = value_at_path(row, field).and_then(coerce_number).unwrap_or(0.0);
                let entry = HeapEntry {
                    key,
                    row: row.clone(),
                };
                match direction {
                    SortDirection::Desc => {
                        // Min-heap of the n largest
                        heap.push(std::cmp::Reverse(entry));
                        if heap.len() > *n {
                            heap.pop();
                        }
                    }
                    SortDirection::Asc => {
                        // Max-heap of the n smallest
                        heap_desc.push(entry);
                        if heap_desc.len() > *n {
                            heap_desc.pop();
                        }
                    }
                }
                false
            }
            ReducerState::Distinct { field, values, cap } => {
                if values.len() >= *cap {
                    return false;
                }
                if let Some(v) = value_at_path(row, field) {
                    values.insert(crate::endpoint::value_to_segment(v));
                }
                false
            }
        }
    }

    /// Materialize the reduced rows. Scalar reducers produce a single row
    /// so every bundle entry has a uniform shape; the row names the reduced
    /// field so the formatter knows what unit the value carries.
    pub fn finish(self) -> Vec<serde_json::Value> {
        match self {
            ReducerState::Collect { rows, .. } => rows,
            ReducerState::Count { count } => vec![json!({ "count": count })],
            ReducerState::Sum { field, sum, counted } => {
                vec![json!({ "sum": number_value(sum), "rows_summed": counted, "field": field })]
            }
            ReducerState::Extreme {
                field,
                minimum,
                value,
            } => {
                let key = if minimum { "min" } else { "max" };
                vec![json!({ key: value.map(number_value), "field": field })]
            }
            ReducerState::TopN {
                direction,
                heap,
                heap_desc,
                ..
            } => {
                let mut entries: Vec<HeapEntry> = match direction {
                    SortDirection::Desc => heap.into_iter().map(|r| r.0).collect(),
                    SortDirection::Asc => heap_desc.into_iter().collect(),
                };
                entries.sort_by(|a, b| match direction {
                    SortDirection::Desc => b.key.total_cmp(&a.key),
                    SortDirection::Asc => a.key.total_cmp(&b.key),
                });
                entries.into_iter().map(|e| e.row).collect()
            }
            ReducerState::Distinct { values, .. } => {
                let count = values.len();
                vec![json!({
                    "distinct": values.into_iter().collect::<Vec<_>>(),
                    "count": count
                })]
            }
        }
    }
}

/// Render an f64 as an integral JSON number when it is one.
fn number_value(v: f64) -> serde_json::Value {
    if v.fract() == 0.0 && v.abs() < (i64::MAX as f64) {
        json!(v as i64)
    } else {
        json!(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_with_amounts(amounts: &[i64]) -> Vec<serde_json::Value> {
        amounts
            .iter()
            .map(|a| json!({"balance": {"amount": a.to_string()}, "id": a}))
            .collect()
    }

    #[test]
    fn test_count() {
        let mut state = ReducerState::new(&Reducer::Count, 1000);
        for row in rows_with_amounts(&[1, 2, 3]) {
            state.push(&row);
        }
        assert_eq!(state.finish(), vec![json!({"count": 3})]);
    }

    #[test]
    fn test_sum_over_string_amounts() {
        let reducer = Reducer::Sum {
            field: "balance.amount".into(),
        };
        let mut state = ReducerState::new(&reducer, 1000);
        for row in rows_with_amounts(&[100, 200, 300]) {
            state.push(&row);
        }
        let out = state.finish();
        assert_eq!(out[0]["sum"], json!(600));
        assert_eq!(out[0]["rows_summed"], json!(3));
        assert_eq!(out[0]["field"], json!("balance.amount"));
    }

    #[test]
    fn test_min_max() {
        let rows = rows_with_amounts(&[7, 3, 9, 5]);

        let mut min_state = ReducerState::new(
            &Reducer::Min {
                field: "balance.amount".into(),
            },
            1000,
        );
        let mut max_state = ReducerState::new(
            &Reducer::Max {
                field: "balance.amount".into(),
            },
            1000,
        );
        for row in &rows {
            min_state.push(row);
            max_state.push(row);
        }
        let min_row = min_state.finish();
        assert_eq!(min_row[0]["min"], json!(3));
        assert_eq!(min_row[0]["field"], json!("balance.amount"));
        assert_eq!(max_state.finish()[0]["max"], json!(9));
    }

    #[test]
    fn test_min_of_nothing_is_null() {
        let state = ReducerState::new(
            &Reducer::Min {
                field: "amount".into(),
            },
            1000,
        );
        assert_eq!(state.finish()[0]["min"], serde_json::Value::Null);
    }

    #[test]
    fn test_top_n_desc_bounded() {
        let reducer = Reducer::TopN {
            field: "balance.amount".into(),
            n: 3,
            direction: SortDirection::Desc,
        };
        let mut state = ReducerState::new(&reducer, 1000);
        // Deliberately unsorted input
        for row in rows_with_amounts(&[5, 90, 12, 7, 300, 2, 44]) {
            state.push(&row);
        }
        let out = state.finish();
        let ids: Vec<i64> = out.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![300, 90, 44]);
    }

    #[test]
    fn test_top_n_asc() {
        let reducer = Reducer::TopN {
            field: "balance.amount".into(),
            n: 2,
            direction: SortDirection::Asc,
        };
        let mut state = ReducerState::new(&reducer, 1000);
        for row in rows_with_amounts(&[5, 90, 1, 7]) {
            state.push(&row);
        }
        let ids: Vec<i64> = state
            .finish()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn test_top_n_larger_than_input() {
        let reducer = Reducer::TopN {
            field: "balance.amount".into(),
            n: 10,
            direction: SortDirection::Desc,
        };
        let mut state = ReducerState::new(&reducer, 1000);
        for row in rows_with_amounts(&[2, 1]) {
            state.push(&row);
        }
        assert_eq!(state.finish().len(), 2);
    }

    #[test]
    fn test_collect_cap_saturates() {
        let mut state = ReducerState::new(&Reducer::Collect, 2);
        let rows = rows_with_amounts(&[1, 2, 3]);
        assert!(!state.push(&rows[0]));
        assert!(!state.push(&rows[1]));
        assert!(state.push(&rows[2]));
        assert_eq!(state.finish().len(), 2);
    }

    #[test]
    fn test_distinct() {
        let reducer = Reducer::Distinct {
            field: "country".into(),
        };
        let mut state = ReducerState::new(&reducer, 1000);
        for country in ["DE", "US", "DE", "FR", "US"] {
            state.push(&json!({ "country": country }));
        }
        let out = state.finish();
        assert_eq!(out[0]["count"], json!(3));
        assert_eq!(out[0]["distinct"], json!(["DE", "FR", "US"]));
    }

    #[test]
    fn test_reducer_serde() {
        let reducer: Reducer = serde_json::from_value(json!({
            "kind": "top_n",
            "field": "balance.amount",
            "n": 5,
            "direction": "desc"
        }))
        .unwrap();
        assert_eq!(
            reducer,
            Reducer::TopN {
                field: "balance.amount".into(),
                n: 5,
                direction: SortDirection::Desc
            }
        );
    }
}
