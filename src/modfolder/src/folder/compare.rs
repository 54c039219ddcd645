//! Item ordering for the view's sort columns

use std::cmp::Ordering;

use super::columns::Column;
use crate::error::hresult;
use crate::idlist::IdListRef;
use crate::pidl::{self, file_name, ModuleRecord};

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Order two modules by `column`, falling back through path (ignoring case),
/// exact path, base address and size so distinct modules never tie
pub fn compare_modules(column: Option<Column>, a: &ModuleRecord, b: &ModuleRecord) -> Ordering {
    let primary = match column {
        Some(Column::Name) => cmp_ignore_case(file_name(&a.path), file_name(&b.path)),
        Some(Column::BaseAddress) => a.base_address.cmp(&b.base_address),
        Some(Column::Size) => a.image_size.cmp(&b.image_size),
        Some(Column::Path) | None => Ordering::Equal,
    };
    primary
        .then_with(|| cmp_ignore_case(&a.path, &b.path))
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.base_address.cmp(&b.base_address))
        .then_with(|| a.image_size.cmp(&b.image_size))
}

/// Order two host identifiers. `param` carries the sort column in its low
/// 16 bits; the high bits are modifier flags the folder ignores.
///
/// Our items sort before foreign ones. Two foreign items compare by record
/// size, then raw bytes.
pub fn compare(param: u32, a: IdListRef<'_>, b: IdListRef<'_>) -> Ordering {
    let column = Column::from_index(param & 0xFFFF);
    match (pidl::decode(a), pidl::decode(b)) {
        (Some(a), Some(b)) => compare_modules(column, &a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            let a = a.first().unwrap_or_default();
            let b = b.first().unwrap_or_default();
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
    }
}

/// Success code carrying the ordering as a signed 16-bit value
pub fn ordering_code(ordering: Ordering) -> i32 {
    let value: i16 = match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    hresult::success_code(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idlist::IdList;

    fn item(path: &str, base: u64, size: u32) -> IdList {
        pidl::encode(path, base, size).unwrap()
    }

    fn foreign(payload: &[u8]) -> IdList {
        let mut bytes = ((payload.len() + 2) as u16).to_le_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&[0, 0]);
        IdList::from_bytes(&bytes).unwrap()
    }

    fn synthetic() -> Vec<IdList> {
        // Duplicate names, sizes and bases across distinct paths
        vec![
            item("C:\\a\\same.dll", 0x1000, 0x100),
            item("C:\\b\\same.dll", 0x1000, 0x100),
            item("C:\\b\\SAME.dll", 0x2000, 0x100),
            item("C:\\c\\other.dll", 0x3000, 0x200),
            item("D:\\same.DLL", 0x0800, 0x300),
            item("C:\\a\\same.dll", 0x5000, 0x100),
        ]
    }

    #[test]
    fn test_total_order_per_column() {
        let items = synthetic();
        for column in 0..5u32 {
            for a in &items {
                for b in &items {
                    let ab = compare(column, a.view(), b.view());
                    let ba = compare(column, b.view(), a.view());
                    assert_eq!(ab, ba.reverse(), "antisymmetry, column {}", column);
                    assert_eq!(ab == Ordering::Equal, a == b, "strictness, column {}", column);

                    for c in &items {
                        if ab == Ordering::Less && compare(column, b.view(), c.view()) == Ordering::Less {
                            assert_eq!(compare(column, a.view(), c.view()), Ordering::Less);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_name_column_ignores_case() {
        let a = item("C:\\x\\Alpha.dll", 0x9000, 1);
        let b = item("C:\\a\\beta.dll", 0x1000, 1);
        assert_eq!(compare(0, a.view(), b.view()), Ordering::Less);
        // Path order would say otherwise
        assert_eq!(compare(3, a.view(), b.view()), Ordering::Greater);
    }

    #[test]
    fn test_numeric_columns() {
        let low = item("C:\\z.dll", 0x1000, 0x9000);
        let high = item("C:\\a.dll", 0x2000, 0x10);
        assert_eq!(compare(1, low.view(), high.view()), Ordering::Less);
        assert_eq!(compare(2, low.view(), high.view()), Ordering::Greater);
    }

    #[test]
    fn test_high_bits_ignored() {
        let a = item("C:\\a.dll", 2, 0);
        let b = item("C:\\b.dll", 1, 0);
        assert_eq!(compare(0x1000_0001, a.view(), b.view()), Ordering::Greater);
    }

    #[test]
    fn test_mixed_ownership_sorts_ours_first() {
        let ours = item("C:\\a.dll", 1, 1);
        let theirs = foreign(b"elsewhere");
        assert_eq!(compare(0, ours.view(), theirs.view()), Ordering::Less);
        assert_eq!(compare(0, theirs.view(), ours.view()), Ordering::Greater);
    }

    #[test]
    fn test_foreign_items_compare_bytes() {
        let short = foreign(b"zz");
        let long = foreign(b"aaa");
        assert_eq!(compare(0, short.view(), long.view()), Ordering::Less);

        let a = foreign(b"abc");
        let b = foreign(b"abd");
        assert_eq!(compare(0, a.view(), b.view()), Ordering::Less);
        assert_eq!(compare(0, a.view(), a.view()), Ordering::Equal);
    }

    #[test]
    fn test_ordering_code() {
        assert_eq!(ordering_code(Ordering::Less), 0xFFFF);
        assert_eq!(ordering_code(Ordering::Equal), 0);
        assert_eq!(ordering_code(Ordering::Greater), 1);
    }
}
