//! Query definitions.
//!
//! A `Query` names a collection and carries filters, an ordering and an
//! optional limit. Queries are immutable values: every builder method returns
//! a new query. Two queries that differ only in their limit describe the same
//! logical view, which paginated subscriptions rely on.

use crate::document::DocumentSnapshot;
use crate::value::Value;
use std::cmp::Ordering;

/// Comparison applied by a filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Field value equals one of the elements of an array operand.
    In,
    /// Field is an array containing the operand.
    ArrayContains,
}

/// A filter compares a document field to a literal value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluates the filter against a document.
    ///
    /// A document without the field never matches.
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        let field_value = match document.get(&self.field) {
            Some(v) => v,
            None => return false,
        };

        match self.op {
            FilterOp::Eq => field_value == &self.value,
            FilterOp::Ne => field_value != &self.value,
            FilterOp::Lt => field_value < &self.value,
            FilterOp::Le => field_value <= &self.value,
            FilterOp::Gt => field_value > &self.value,
            FilterOp::Ge => field_value >= &self.value,
            FilterOp::In => self
                .value
                .as_array()
                .map(|candidates| candidates.contains(field_value))
                .unwrap_or(false),
            FilterOp::ArrayContains => field_value
                .as_array()
                .map(|items| items.contains(&self.value))
                .unwrap_or(false),
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One ordering key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A query over one collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    /// Creates a query returning every document of `collection`.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Adds a filter.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    /// Shorthand for an equality filter.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Appends an ordering key.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Returns a copy with the result count limited to `n`, replacing any
    /// previous limit.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Returns a copy without a limit.
    pub fn without_limit(&self) -> Self {
        Self {
            limit: None,
            ..self.clone()
        }
    }

    /// Returns the collection name.
    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Returns the filters.
    #[inline]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns the ordering keys.
    #[inline]
    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Returns the limit, if any.
    #[inline]
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Returns true if both queries describe the same view, ignoring limits.
    pub fn same_view(&self, other: &Query) -> bool {
        self.collection == other.collection
            && self.filters == other.filters
            && self.order_by == other.order_by
    }

    /// Returns true if the document belongs to this query's result set,
    /// ignoring the limit.
    ///
    /// Documents must carry every ordered field to be included.
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        document.exists()
            && document.reference().collection() == self.collection
            && self.filters.iter().all(|f| f.matches(document))
            && self.order_by.iter().all(|o| document.get(&o.field).is_some())
    }

    /// Compares two documents by this query's ordering, breaking ties by
    /// document id.
    pub fn compare(&self, a: &DocumentSnapshot, b: &DocumentSnapshot) -> Ordering {
        for key in &self.order_by {
            let ordering = match (a.get(&key.field), b.get(&key.field)) {
                (Some(x), Some(y)) => x.cmp(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = match key.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id().cmp(b.id())
    }
}
