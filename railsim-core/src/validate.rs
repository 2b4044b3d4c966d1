//! Object validation: every problem is collected into [ValidationErrors] before failing.

use crate::imports::*;

pub type ValidationResults = Result<(), ValidationErrors>;

#[derive(Debug, Default)]
pub struct ValidationErrors(Vec<anyhow::Error>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, err: anyhow::Error) {
        self.0.push(err);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Appends `other`, prefixing each error with `name`
    pub fn append_with_name(&mut self, other: ValidationErrors, name: &str) {
        self.0
            .extend(other.0.into_iter().map(|err| err.context(name.to_string())));
    }
    pub fn make_err(self) -> ValidationResults {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for err in &self.0 {
            writeln!(f, "{err:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Returns early with the collected errors if there are any
#[macro_export]
macro_rules! early_err {
    ($errors:expr, $name:expr) => {
        if !$errors.is_empty() {
            let mut wrapped = $crate::validate::ValidationErrors::new();
            wrapped.append_with_name($errors, $name);
            return Err(wrapped);
        }
    };
}

/// Returns `Ok(())` early for fake objects, which carry no data to validate
#[macro_export]
macro_rules! early_fake_ok {
    ($obj:expr) => {
        if $obj.is_fake() {
            return Ok(());
        }
    };
}

/// Provides a known-good instance for tests and defaults
pub trait Valid: Sized + Default {
    fn valid() -> Self {
        Default::default()
    }
}

/// Methods for checking whether an object is fake (a placeholder) and whether it is valid
pub trait ObjState {
    fn is_fake(&self) -> bool {
        false
    }
    fn is_real(&self) -> bool {
        !self.is_fake()
    }
    fn validate(&self) -> ValidationResults {
        Ok(())
    }
}

pub fn validate_field_real<T: ObjState + ?Sized>(
    errors: &mut ValidationErrors,
    field: &T,
    name: &str,
) {
    if field.is_fake() {
        errors.push(anyhow!("{name} must be real!"));
    } else if let Err(field_errors) = field.validate() {
        errors.append_with_name(field_errors, name);
    }
}

pub fn validate_slice_real<T: ObjState>(errors: &mut ValidationErrors, elems: &[T], name: &str) {
    for (i, elem) in elems.iter().enumerate() {
        validate_field_real(errors, elem, &format!("{name} idx = {i}"));
    }
}

macro_rules! si_chk_num {
    ($($suffix:ident: $cmp:expr, $desc:literal;)*) => {
        paste::paste! {
            $(
                #[doc = "Pushes an error unless `val` is " $desc]
                pub fn [<si_chk_num_ $suffix>]<D, U>(
                    errors: &mut ValidationErrors,
                    val: &uom::si::Quantity<D, U, f64>,
                    name: &str,
                ) where
                    D: uom::si::Dimension + ?Sized,
                    U: uom::si::Units<f64> + ?Sized,
                {
                    let check: fn(f64) -> bool = $cmp;
                    if !check(val.value) {
                        errors.push(anyhow!("{} = {:?} must be {}!", name, val.value, $desc));
                    }
                }
            )*
        }
    };
}

si_chk_num! {
    fin: |x| x.is_finite(), "finite";
    gez: |x| x >= 0.0, "greater than or equal to zero";
    gtz: |x| x > 0.0, "greater than zero";
    eqz: |x| x == 0.0, "equal to zero";
    gtz_fin: |x| x > 0.0 && x.is_finite(), "finite and greater than zero";
    gez_fin: |x| x >= 0.0 && x.is_finite(), "finite and greater than or equal to zero";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_si_chk_num() {
        let mut errors = ValidationErrors::new();
        si_chk_num_gtz(&mut errors, &(1.0 * uc::M), "Length");
        si_chk_num_gez(&mut errors, &(0.0 * uc::M), "Length");
        assert!(errors.is_empty());
        si_chk_num_gtz(&mut errors, &(0.0 * uc::S), "Time");
        si_chk_num_fin(&mut errors, &(f64::NAN * uc::MPS), "Speed");
        assert_eq!(errors.len(), 2);
        assert!(errors.make_err().is_err());
    }
}
