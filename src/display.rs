use std::borrow::Borrow;
use std::marker::PhantomData;

use colored::*;
use itertools::Itertools;
use prettytable::{cell, format, row, Row, Table};

use crate::rib::{Operation, PathAttributes, RibPath, StoreValue, StoredValue};
use crate::utils::{format_time_as_elapsed, maybe_string, u32_to_dotted, EMPTY_VALUE};

pub trait ToRow {
    fn columns() -> Row;
    fn to_row(&self) -> Row;
}

pub struct OutputTable<T: ToRow> {
    inner: Table,
    row_type: PhantomData<T>,
}

impl<T> OutputTable<T>
where
    T: ToRow,
{
    pub fn new() -> Self {
        let format = format::FormatBuilder::new()
            .padding(1, 1)
            .separator(
                format::LinePosition::Title,
                format::LineSeparator::new('-', '+', '+', '+'),
            )
            .build();
        Self::with_format(format)
    }

    pub fn with_format(format: format::TableFormat) -> Self {
        let mut table = Table::new();
        table.set_format(format);
        table.add_row(T::columns());
        Self {
            inner: table,
            row_type: PhantomData,
        }
    }

    pub fn add_row(&mut self, row: &T) {
        self.inner.add_row(row.to_row());
    }

    pub fn len(&self) -> usize {
        // Title row doesn't count
        self.inner.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn print(&self) {
        self.inner.printstd();
    }
}

impl<T> Default for OutputTable<T>
where
    T: ToRow,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Where a stored route lives: Loc-RIB or the peer's Adj-RIB-Out
fn rib_name(path: &RibPath) -> String {
    path.peer_id()
        .map(|peer_id| peer_id.to_string())
        .unwrap_or_else(|| String::from("Loc-RIB"))
}

fn communities(attributes: &PathAttributes) -> String {
    attributes
        .communities
        .iter()
        .map(|community| u32_to_dotted(*community, ':'))
        .join(" ")
}

/// Route node committed to the store
pub struct RouteRow<'a, A> {
    pub path: &'a RibPath,
    pub stored: &'a StoredValue<A>,
}

impl<'a, A> ToRow for RouteRow<'a, A>
where
    A: Borrow<PathAttributes>,
{
    fn columns() -> Row {
        row![
            "RIB",
            "Prefix",
            "Path ID",
            "Next Hop",
            "Age",
            "Origin",
            "Local Pref",
            "Metric",
            "AS Path",
            "Communities"
        ]
    }

    fn to_row(&self) -> Row {
        let attributes: &PathAttributes = Borrow::borrow(self.stored.value.attributes());
        let (prefix, path_id) = match self.path.route_id() {
            Some(route_id) => (route_id.route_key().to_string(), route_id.path_id().to_string()),
            None => (String::from(EMPTY_VALUE), String::from(EMPTY_VALUE)),
        };
        row![
            rib_name(self.path),
            prefix,
            path_id,
            maybe_string(attributes.next_hop.as_ref()),
            format_time_as_elapsed(self.stored.written),
            attributes.origin.to_string(),
            maybe_string(attributes.local_pref.as_ref()),
            maybe_string(attributes.multi_exit_disc.as_ref()),
            attributes.as_path_string(),
            communities(attributes),
        ]
    }
}

/// Operation recorded in a transaction
pub struct OperationRow<'a, A>(pub &'a Operation<A>);

impl<'a, A> ToRow for OperationRow<'a, A>
where
    A: Borrow<PathAttributes>,
{
    fn columns() -> Row {
        row!["Op", "Store", "Path", "Next Hop", "Local Pref", "AS Path"]
    }

    fn to_row(&self) -> Row {
        match self.0 {
            Operation::Put { store, path, value } => {
                let attributes: &PathAttributes = Borrow::borrow(value.attributes());
                let kind = match value {
                    StoreValue::Route(_) => "PUT",
                    StoreValue::Attributes(_) => "PUT attributes",
                };
                row![
                    kind.green(),
                    store.to_string(),
                    path.to_string(),
                    maybe_string(attributes.next_hop.as_ref()),
                    maybe_string(attributes.local_pref.as_ref()),
                    attributes.as_path_string(),
                ]
            }
            Operation::Delete { store, path } => row![
                "DELETE".red(),
                store.to_string(),
                path.to_string(),
                "",
                "",
                "",
            ],
        }
    }
}
