//! Canonical calendar month names and ordering helpers.

/// Month names in calendar order; these are the keys a ledger groups bills by.
pub const MONTHS_OF_YEAR: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Zero-based calendar position of `name`, or `None` for non-canonical names.
pub fn calendar_index(name: &str) -> Option<usize> {
    MONTHS_OF_YEAR.iter().position(|month| *month == name)
}

/// Canonical month names contained in `names`, in calendar order.
/// Anything that is not a calendar month name is dropped.
pub fn in_calendar_order<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered: Vec<(usize, &str)> = names
        .into_iter()
        .filter_map(|name| calendar_index(name).map(|index| (index, name)))
        .collect();
    ordered.sort_unstable_by_key(|(index, _)| *index);
    ordered.dedup_by_key(|(index, _)| *index);
    ordered.into_iter().map(|(_, name)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_calendar_not_input() {
        let ordered = in_calendar_order(["March", "January", "Smarch", "December"]);
        assert_eq!(ordered, vec!["January", "March", "December"]);
    }

    #[test]
    fn calendar_index_is_case_sensitive() {
        assert_eq!(calendar_index("January"), Some(0));
        assert_eq!(calendar_index("April"), Some(3));
        assert_eq!(calendar_index("april"), None);
    }
}
