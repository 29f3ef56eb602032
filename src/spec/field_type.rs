use apollo_compiler::schema;
use serde::de::Error as _;
use serde::Deserialize;
use serde::Serialize;

/// The declared type of a requested field, carrying nullability and list
/// wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldType(pub(crate) schema::Type);

// schema::Type does not implement Serialize or Deserialize,
// and <https://serde.rs/remote-derive.html> seems not to work for recursive types.
// Instead have explicit `impl`s that are based on derived impl of purpose-built types.

impl Serialize for FieldType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        struct BorrowedFieldType<'a>(&'a schema::Type);

        impl<'a> Serialize for BorrowedFieldType<'a> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                #[derive(Serialize)]
                enum NestedBorrowed<'a> {
                    Named(&'a str),
                    NonNullNamed(&'a str),
                    List(BorrowedFieldType<'a>),
                    NonNullList(BorrowedFieldType<'a>),
                }
                match &self.0 {
                    schema::Type::Named(name) => NestedBorrowed::Named(name),
                    schema::Type::NonNullNamed(name) => NestedBorrowed::NonNullNamed(name),
                    schema::Type::List(ty) => NestedBorrowed::List(BorrowedFieldType(ty)),
                    schema::Type::NonNullList(ty) => {
                        NestedBorrowed::NonNullList(BorrowedFieldType(ty))
                    }
                }
                .serialize(serializer)
            }
        }

        BorrowedFieldType(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        enum WithoutLocation {
            Named(String),
            NonNullNamed(String),
            List(FieldType),
            NonNullList(FieldType),
        }
        Ok(match WithoutLocation::deserialize(deserializer)? {
            WithoutLocation::Named(name) => FieldType(schema::Type::Named(
                name.try_into().map_err(D::Error::custom)?,
            )),
            WithoutLocation::NonNullNamed(name) => FieldType(
                schema::Type::Named(name.try_into().map_err(D::Error::custom)?).non_null(),
            ),
            WithoutLocation::List(ty) => FieldType(ty.0.list()),
            WithoutLocation::NonNullList(ty) => FieldType(ty.0.list().non_null()),
        })
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FieldType {
    pub(crate) fn is_non_null(&self) -> bool {
        self.0.is_non_null()
    }

    /// The element type when this is a list type (however deeply non-null).
    pub(crate) fn list_element(&self) -> Option<FieldType> {
        match &self.0 {
            schema::Type::List(inner) | schema::Type::NonNullList(inner) => {
                Some(FieldType((**inner).clone()))
            }
            _ => None,
        }
    }

    /// The name of the underlying named type, with every wrapper stripped.
    pub(crate) fn inner_named_type(&self) -> &str {
        self.0.inner_named_type().as_str()
    }
}

impl From<&'_ schema::Type> for FieldType {
    fn from(ty: &'_ schema::Type) -> Self {
        Self(ty.clone())
    }
}

/// Make sure custom Serialize and Deserialize impls are compatible with each other
#[test]
fn test_field_type_serialization() {
    let ty = FieldType(apollo_compiler::ty!([ID]!));
    assert_eq!(
        serde_json::from_str::<FieldType>(&serde_json::to_string(&ty).unwrap()).unwrap(),
        ty
    )
}

#[test]
fn test_list_element_nullability() {
    let non_null_elements = FieldType(apollo_compiler::ty!([Gizmo!]));
    assert!(!non_null_elements.is_non_null());
    assert!(non_null_elements.list_element().unwrap().is_non_null());

    let nullable_elements = FieldType(apollo_compiler::ty!([Gizmo]!));
    assert!(nullable_elements.is_non_null());
    assert!(!nullable_elements.list_element().unwrap().is_non_null());

    assert_eq!(nullable_elements.inner_named_type(), "Gizmo");
    assert!(FieldType(apollo_compiler::ty!(Gizmo)).list_element().is_none());
}
