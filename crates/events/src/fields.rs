/// Generate accessors for fields carried by every variant of a message enum.
///
/// Each variant must wrap a single payload struct, and each named field must
/// be `Copy`:
///
/// ```ignore
/// partsupply_events::variant_fields! {
///     ReorderEvent [ReorderOpened, ReorderApproved, ReorderFulfilled] {
///         fn supplier_id -> SupplierId;
///         fn occurred_at -> DateTime<Utc>;
///     }
/// }
/// ```
#[macro_export]
macro_rules! variant_fields {
    (@accessor $enum:ident [$($variant:ident),+ $(,)?] $field:ident $ty:ty) => {
        pub fn $field(&self) -> $ty {
            match self {
                $( $enum::$variant(inner) => inner.$field, )+
            }
        }
    };
    ($enum:ident $variants:tt { $( fn $field:ident -> $ty:ty; )+ }) => {
        impl $enum {
            $( $crate::variant_fields!(@accessor $enum $variants $field $ty); )+
        }
    };
}
