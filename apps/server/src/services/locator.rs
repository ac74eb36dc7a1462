//! Resource Locator
//!
//! Pure lookups over the entries of one bundle. Nothing here does I/O or mutates
//! the bundle.

use crate::store::ParsedUrl;
use mhd_models::{Bundle, BundleEntry, Resource};

/// Every entry resource of `resource_type`, in bundle order.
pub fn filter_by_type<'a>(bundle: &'a Bundle, resource_type: &str) -> Vec<&'a Resource> {
    bundle
        .entries()
        .iter()
        .filter_map(|entry| entry.resource.as_ref())
        .filter(|resource| resource.resource_type() == resource_type)
        .collect()
}

/// Same as [`filter_by_type`] but keeps the entry position alongside the entry.
pub fn entries_of_type<'a>(
    bundle: &'a Bundle,
    resource_type: &str,
) -> Vec<(usize, &'a BundleEntry, &'a Resource)> {
    bundle
        .entries()
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| entry.resource.as_ref().map(|r| (index, entry, r)))
        .filter(|(_, _, resource)| resource.resource_type() == resource_type)
        .collect()
}

/// Resolve `reference` to a resource of `resource_type` inside the bundle.
///
/// An exact `fullUrl` match wins. Otherwise the reference is read as
/// `[base/]Type/id[/_history/v]` and compared with each candidate's id and with the
/// identity in its `fullUrl`. The first entry in bundle order wins either way.
pub fn find_by_reference<'a>(
    bundle: &'a Bundle,
    resource_type: &str,
    reference: &str,
) -> Option<&'a Resource> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let candidates = entries_of_type(bundle, resource_type);

    if let Some((_, _, resource)) = candidates
        .iter()
        .find(|(_, entry, _)| entry.full_url.as_deref() == Some(reference))
    {
        return Some(*resource);
    }

    let parsed = ParsedUrl::parse(reference);
    if parsed.resource_type.as_deref() != Some(resource_type) {
        return None;
    }
    let target = parsed.resource_id.as_deref()?;
    let identity = parsed.identity()?;

    candidates
        .into_iter()
        .find(|(_, entry, resource)| {
            resource.id() == Some(target)
                || entry
                    .full_url
                    .as_deref()
                    .and_then(|url| ParsedUrl::parse(url).identity())
                    .as_deref()
                    == Some(identity.as_str())
        })
        .map(|(_, _, resource)| resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhd_models::{Binary, BundleType, DocumentReference};

    fn binary(id: Option<&str>, data: &str) -> Resource {
        let mut binary = Binary::new("text/plain", data);
        binary.id = id.map(str::to_string);
        Resource::Binary(binary)
    }

    fn bundle(entries: Vec<(Option<&str>, Resource)>) -> Bundle {
        let mut bundle = Bundle::new(BundleType::Transaction);
        for (full_url, resource) in entries {
            bundle.push_entry(BundleEntry::with_resource(
                full_url.map(str::to_string),
                resource,
            ));
        }
        bundle
    }

    #[test]
    fn filter_keeps_bundle_order() {
        let b = bundle(vec![
            (None, binary(Some("b1"), "YQ==")),
            (None, Resource::DocumentReference(DocumentReference::default())),
            (None, binary(Some("b2"), "Yg==")),
        ]);

        let ids: Vec<_> = filter_by_type(&b, "Binary")
            .into_iter()
            .filter_map(Resource::id)
            .collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        assert!(filter_by_type(&b, "MessageHeader").is_empty());
    }

    #[test]
    fn full_url_match_wins_and_first_duplicate_wins() {
        let b = bundle(vec![
            (Some("urn:uuid:1"), binary(Some("first"), "YQ==")),
            (Some("urn:uuid:1"), binary(Some("second"), "Yg==")),
        ]);
        let found = find_by_reference(&b, "Binary", "urn:uuid:1").unwrap();
        assert_eq!(found.id(), Some("first"));
    }

    #[test]
    fn full_url_match_requires_the_requested_type() {
        let b = bundle(vec![(
            Some("urn:uuid:1"),
            Resource::DocumentReference(DocumentReference::default()),
        )]);
        assert!(find_by_reference(&b, "Binary", "urn:uuid:1").is_none());
    }

    #[test]
    fn relative_and_absolute_urls_fall_back_to_id() {
        let b = bundle(vec![
            (Some("urn:uuid:x"), binary(Some("abc"), "YQ==")),
            (Some("https://other.example.org/fhir/Binary/def"), binary(None, "Yg==")),
        ]);

        assert_eq!(
            find_by_reference(&b, "Binary", "Binary/abc").and_then(Resource::id),
            Some("abc")
        );
        assert_eq!(
            find_by_reference(&b, "Binary", "https://store.example.org/fhir/Binary/abc")
                .and_then(Resource::id),
            Some("abc")
        );
        assert!(find_by_reference(&b, "Binary", "Binary/def").is_some());
    }

    #[test]
    fn unresolved_references_return_none() {
        let b = bundle(vec![(Some("urn:uuid:1"), binary(Some("abc"), "YQ=="))]);
        assert!(find_by_reference(&b, "Binary", "urn:uuid:2").is_none());
        assert!(find_by_reference(&b, "Binary", "DocumentReference/abc").is_none());
        assert!(find_by_reference(&b, "Binary", "https://docs.example.org/report.pdf").is_none());
        assert!(find_by_reference(&b, "Binary", "  ").is_none());
    }
}
