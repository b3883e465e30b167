//! Helper functions and data types

use std::{cmp::Ordering, fmt, hash, sync::Arc};

/// Named, shareable closure with one argument. Equality, ordering and
/// hashing only look at the name.
#[derive(Clone)]
pub struct WrapFunc<Input, Output> {
    name: String,
    func: Arc<dyn Fn(Input) -> Output + Send + Sync + 'static>,
}

impl<I, J> WrapFunc<I, J> {
    pub fn new<N, F>(name: N, func: F) -> Self
    where
        N: Into<String>,
        F: Fn(I) -> J + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, input: I) -> J {
        self.func.as_ref()(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shorthand for [`WrapFunc::new`].
macro_rules! wrap {
    ($name:expr, $func:expr) => {
        $crate::utils::WrapFunc::new($name, $func)
    };
}

pub(crate) use wrap;

impl<I, J> fmt::Debug for WrapFunc<I, J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<WrapFunc: {}>", self.name)
    }
}

impl<I, J> PartialEq for WrapFunc<I, J> {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq(&other.name)
    }
}

impl<I, J> Eq for WrapFunc<I, J> {}

impl<I, J> PartialOrd for WrapFunc<I, J> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I, J> Ord for WrapFunc<I, J> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl<I, J> hash::Hash for WrapFunc<I, J> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Median of `values`, averaging the two middle elements for even lengths.
/// Returns NaN for an empty input.
pub fn median_of_floats(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::median_of_floats;

    #[test]
    fn median() {
        assert_eq!(median_of_floats(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_of_floats(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median_of_floats(vec![]).is_nan());
    }

    #[test]
    fn wrapped_funcs_compare_by_name() {
        let a = wrap!("a", |x: f64| x * 2.0);
        let b = wrap!("b", |x: f64| x);

        assert!(a < b);
        assert_eq!(a.call(2.0), 4.0);
        assert_eq!(a, wrap!("a", |x: f64| x + 1.0));
        assert_eq!(format!("{b:?}"), "<WrapFunc: b>");
    }
}
