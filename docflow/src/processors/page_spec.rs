//! Parser for the `split` page-selection grammar:
//! `spec := part ("," part)*`, `part := int | int "-" int`.

use crate::error::ApiError;

/// Parses a page spec into a sorted, de-duplicated set of 1-based page
/// numbers, rejecting anything that would select zero pages, a reversed
/// range, or a page beyond `page_count`.
pub fn parse(spec: &str, page_count: usize) -> Result<Vec<usize>, ApiError> {
    let mut pages = std::collections::BTreeSet::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ApiError::invalid_page_spec("empty page spec segment"));
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start
                .trim()
                .parse()
                .map_err(|_| ApiError::invalid_page_spec(format!("not a number: {start}")))?;
            let end: usize = end
                .trim()
                .parse()
                .map_err(|_| ApiError::invalid_page_spec(format!("not a number: {end}")))?;
            if start == 0 || end == 0 {
                return Err(ApiError::invalid_page_spec("page numbers are 1-based"));
            }
            if start > end {
                return Err(ApiError::invalid_page_spec(format!(
                    "reversed range: {start}-{end}"
                )));
            }
            for p in start..=end {
                pages.insert(p);
            }
        } else {
            let p: usize = part
                .parse()
                .map_err(|_| ApiError::invalid_page_spec(format!("not a number: {part}")))?;
            if p == 0 {
                return Err(ApiError::invalid_page_spec("page numbers are 1-based"));
            }
            pages.insert(p);
        }
    }

    if pages.is_empty() {
        return Err(ApiError::invalid_page_spec("empty page spec"));
    }
    if let Some(&max) = pages.iter().max() {
        if max > page_count {
            return Err(ApiError::page_out_of_range(format!(
                "page {max} exceeds document length {page_count}"
            )));
        }
    }

    Ok(pages.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_pages_and_ranges() {
        assert_eq!(parse("1,3-4", 5).unwrap(), vec![1, 3, 4]);
    }

    #[test]
    fn de_duplicates_and_sorts() {
        assert_eq!(parse("3,1,2-3", 5).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn rejects_reversed_range() {
        let err = parse("5-3", 10).unwrap_err();
        assert_eq!(err.kind(), docflow_api::ErrorKind::InvalidPageSpec);
    }

    #[test]
    fn rejects_page_beyond_document_length() {
        let err = parse("1,9", 5).unwrap_err();
        assert_eq!(err.kind(), docflow_api::ErrorKind::PageOutOfRange);
    }

    #[test]
    fn rejects_zero_and_empty() {
        assert!(parse("0", 5).is_err());
        assert!(parse("", 5).is_err());
        assert!(parse("  ", 5).is_err());
    }

    #[test]
    fn allows_whitespace_around_tokens() {
        assert_eq!(parse(" 1 , 2 - 3 ", 5).unwrap(), vec![1, 2, 3]);
    }
}
