//! Contact directory queries: search, filters, sorting, facets and birthdays.
//!
//! Every predicate tolerates absent attributes; a missing value never
//! matches a filter that asks for it and never panics.

use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::types::Contact;

/// Filter chosen on the directory screen. The default matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
  pub search: String,
  pub students: bool,
  pub teachers: bool,
  pub batch: Option<String>,
  /// Any of these genders; empty means no constraint
  pub genders: Vec<String>,
  /// Any of these blood types; empty means no constraint
  pub blood_types: Vec<String>,
}

impl ContactFilter {
  /// Whether anything besides the free-text search is set.
  pub fn is_active(&self) -> bool {
    self.students
      || self.teachers
      || self.batch.is_some()
      || !self.genders.is_empty()
      || !self.blood_types.is_empty()
  }

  pub fn matches(&self, contact: &Contact) -> bool {
    matches_search(contact, &self.search)
      && self.matches_roles(contact)
      && self
        .batch
        .as_ref()
        .map_or(true, |b| contact.batch.as_ref() == Some(b))
      && one_of(&self.genders, contact.gender.as_deref())
      && one_of(&self.blood_types, contact.blood_type.as_deref())
  }

  // Selected roles are alternatives: a teacher matches "students or teachers".
  fn matches_roles(&self, contact: &Contact) -> bool {
    if !self.students && !self.teachers {
      return true;
    }
    (self.students && contact.roles.um_student == Some(true))
      || (self.teachers && contact.roles.um_teacher == Some(true))
  }
}

fn one_of(allowed: &[String], value: Option<&str>) -> bool {
  allowed.is_empty() || value.is_some_and(|v| allowed.iter().any(|a| a == v))
}

/// Case-insensitive match on name and email, verbatim on phone and student id.
pub fn matches_search(contact: &Contact, query: &str) -> bool {
  let query = query.trim();
  if query.is_empty() {
    return true;
  }
  let lowered = query.to_lowercase();
  contact.name.to_lowercase().contains(&lowered)
    || contact.email.to_lowercase().contains(&lowered)
    || contact.phone.as_deref().is_some_and(|p| p.contains(query))
    || contact.student_id.as_deref().is_some_and(|s| s.contains(query))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortField {
  #[default]
  Name,
  Email,
  Batch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactSort {
  pub field: SortField,
  pub descending: bool,
}

impl ContactSort {
  fn key<'a>(&self, contact: &'a Contact) -> Option<&'a str> {
    let value = match self.field {
      SortField::Name => Some(contact.name.as_str()),
      SortField::Email => Some(contact.email.as_str()),
      SortField::Batch => contact.batch.as_deref(),
    };
    value.filter(|v| !v.trim().is_empty())
  }

  /// Absent values sort last in either direction.
  pub fn compare(&self, a: &Contact, b: &Contact) -> Ordering {
    match (self.key(a), self.key(b)) {
      (Some(x), Some(y)) => {
        let ord = x.to_lowercase().cmp(&y.to_lowercase());
        if self.descending {
          ord.reverse()
        } else {
          ord
        }
      }
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    }
  }
}

/// Filter then sort, leaving the input untouched.
pub fn apply(contacts: &[Contact], filter: &ContactFilter, sort: ContactSort) -> Vec<Contact> {
  let mut result: Vec<Contact> = contacts
    .iter()
    .filter(|c| filter.matches(c))
    .cloned()
    .collect();
  result.sort_by(|a, b| sort.compare(a, b));
  result
}

/// Values offered by the filter sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
  /// Newest batch first
  pub batches: Vec<String>,
  pub genders: Vec<String>,
  pub blood_types: Vec<String>,
}

pub fn facets(contacts: &[Contact]) -> Facets {
  fn unique<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
    values
      .flatten()
      .filter(|v| !v.is_empty())
      .cloned()
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  let mut batches = unique(contacts.iter().map(|c| c.batch.as_ref()));
  batches.reverse();

  Facets {
    batches,
    genders: unique(contacts.iter().map(|c| c.gender.as_ref())),
    blood_types: unique(contacts.iter().map(|c| c.blood_type.as_ref())),
  }
}

/// Days from `today` until the next `MM/DD` birthday; 0 when it is today.
///
/// A 29 February birthday falls on 1 March in common years.
pub fn days_until_birthday(birthday: &str, today: NaiveDate) -> Option<i64> {
  let (month, day) = birthday.trim().split_once('/')?;
  let month: u32 = month.trim().parse().ok()?;
  let day: u32 = day.trim().split('/').next()?.trim().parse().ok()?;
  if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
    return None;
  }
  // Rejects 31 April and friends
  NaiveDate::from_ymd_opt(2000, month, day)?;

  let on = |year: i32| {
    NaiveDate::from_ymd_opt(year, month, day)
      .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
  };
  let mut next = on(today.year())?;
  if next < today {
    next = on(today.year() + 1)?;
  }
  Some((next - today).num_days())
}

/// Contacts with a valid birthday, soonest first.
pub fn upcoming_birthdays(contacts: &[Contact], today: NaiveDate) -> Vec<(&Contact, i64)> {
  let mut upcoming: Vec<(&Contact, i64)> = contacts
    .iter()
    .filter_map(|c| {
      let days = days_until_birthday(c.birthday.as_deref()?, today)?;
      Some((c, days))
    })
    .collect();
  upcoming.sort_by_key(|(_, days)| *days);
  upcoming
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::contact;
  use crate::types::Roles;

  fn directory() -> Vec<Contact> {
    let mut alice = contact("Alice", "alice@x.org");
    alice.batch = Some("2021".to_string());
    alice.gender = Some("Female".to_string());
    alice.blood_type = Some("A+".to_string());
    alice.roles = Roles {
      um_student: Some(true),
      um_teacher: None,
    };
    alice.phone = Some("01700".to_string());

    let mut bob = contact("bob", "bob@x.org");
    bob.batch = Some("2019".to_string());
    bob.gender = Some("Male".to_string());
    bob.blood_type = Some("O-".to_string());
    bob.student_id = Some("S-42".to_string());

    let mut carol = contact("Carol", "carol@x.org");
    carol.roles = Roles {
      um_student: None,
      um_teacher: Some(true),
    };

    vec![alice, bob, carol]
  }

  fn names(contacts: &[Contact]) -> Vec<&str> {
    contacts.iter().map(|c| c.name.as_str()).collect()
  }

  #[test]
  fn test_search_fields() {
    let all = directory();
    let by = |q: &str| {
      let filter = ContactFilter {
        search: q.to_string(),
        ..Default::default()
      };
      names(&apply(&all, &filter, ContactSort::default()))
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
    };

    assert_eq!(by("ALI"), vec!["Alice"]);
    assert_eq!(by("bob@"), vec!["bob"]);
    assert_eq!(by("0170"), vec!["Alice"]);
    assert_eq!(by("S-42"), vec!["bob"]);
    assert_eq!(by("  "), vec!["Alice", "bob", "Carol"]);
  }

  #[test]
  fn test_filters_tolerate_absent_attributes() {
    let all = directory();

    let filter = ContactFilter {
      blood_types: vec!["A+".to_string(), "O-".to_string()],
      ..Default::default()
    };
    assert_eq!(names(&apply(&all, &filter, ContactSort::default())), vec!["Alice", "bob"]);

    let filter = ContactFilter {
      batch: Some("2019".to_string()),
      ..Default::default()
    };
    assert_eq!(names(&apply(&all, &filter, ContactSort::default())), vec!["bob"]);

    let filter = ContactFilter {
      students: true,
      teachers: true,
      ..Default::default()
    };
    assert!(filter.is_active());
    assert_eq!(names(&apply(&all, &filter, ContactSort::default())), vec!["Alice", "Carol"]);
  }

  #[test]
  fn test_sort_absent_last_both_directions() {
    let all = directory();
    let filter = ContactFilter::default();

    let asc = ContactSort {
      field: SortField::Batch,
      descending: false,
    };
    assert_eq!(names(&apply(&all, &filter, asc)), vec!["bob", "Alice", "Carol"]);

    let desc = ContactSort {
      field: SortField::Batch,
      descending: true,
    };
    assert_eq!(names(&apply(&all, &filter, desc)), vec!["Alice", "bob", "Carol"]);

    let by_name = ContactSort {
      field: SortField::Name,
      descending: true,
    };
    assert_eq!(names(&apply(&all, &filter, by_name)), vec!["Carol", "bob", "Alice"]);
  }

  #[test]
  fn test_facets() {
    let facets = facets(&directory());
    assert_eq!(facets.batches, vec!["2021", "2019"]);
    assert_eq!(facets.genders, vec!["Female", "Male"]);
    assert_eq!(facets.blood_types, vec!["A+", "O-"]);
  }

  #[test]
  fn test_days_until_birthday() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    assert_eq!(days_until_birthday("03/10", today), Some(0));
    assert_eq!(days_until_birthday("03/11", today), Some(1));
    // Already passed this year
    assert_eq!(days_until_birthday("03/09", today), Some(364));
    assert_eq!(days_until_birthday("13/01", today), None);
    assert_eq!(days_until_birthday("04/31", today), None);
    assert_eq!(days_until_birthday("soon", today), None);

    let common_year = NaiveDate::from_ymd_opt(2025, 2, 20).unwrap();
    assert_eq!(days_until_birthday("02/29", common_year), Some(9));
  }

  #[test]
  fn test_upcoming_birthdays_order() {
    let mut all = directory();
    all[0].birthday = Some("12/01".to_string());
    all[1].birthday = Some("03/12".to_string());
    all[2].birthday = Some("not a date".to_string());

    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    let upcoming = upcoming_birthdays(&all, today);
    let order: Vec<(&str, i64)> = upcoming.iter().map(|(c, d)| (c.name.as_str(), *d)).collect();
    assert_eq!(order, vec![("bob", 2), ("Alice", 266)]);
  }
}
