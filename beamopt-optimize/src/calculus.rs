use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use std::convert::Infallible;

/// Approximates the gradient of the function `f: R^n -> R` with central finite differences.
///
/// The parameter `h` is the absolute step size. The vector `x` is mutable in order to hold the
/// perturbed points, but upon returning, its content remains unchanged.
pub fn approximate_gradient_fd<'a, T>(
    mut f: impl FnMut(DVectorView<T>) -> T,
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DVector<T>
where
    T: Real,
{
    let result: Result<_, Infallible> = try_approximate_gradient_fd(|x| Ok(f(x)), x, h);
    match result {
        Ok(gradient) => gradient,
        Err(never) => match never {},
    }
}

/// Same as [`approximate_gradient_fd`], but for functions that may fail.
///
/// The first error returned by `f` aborts the approximation. Even then, `x` is restored
/// to its original content.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn try_approximate_gradient_fd<'a, T, E>(
    mut f: impl FnMut(DVectorView<T>) -> Result<T, E>,
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> Result<DVector<T>, E>
where
    T: Real,
{
    let mut x = x.into();
    let n = x.len();
    let mut gradient = DVector::zeros(n);

    for i in 0..n {
        let x_i = x[i];
        x[i] = x_i + h;
        let f_plus = f(DVectorView::from(&x));
        x[i] = x_i - h;
        let f_minus = f(DVectorView::from(&x));
        x[i] = x_i;
        gradient[i] = (f_plus? - f_minus?) / (2.0 * h);
    }

    Ok(gradient)
}

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with central finite differences.
///
/// The Jacobian is the $m \times n$ matrix with entries $J_{ij} = \partial f_i / \partial x_j$.
/// The closure receives the evaluation point and an output vector of length `m` to fill in.
pub fn approximate_jacobian_fd<'a, T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DMatrix<T>
where
    T: Real,
{
    let result: Result<_, Infallible> = try_approximate_jacobian_fd(
        m,
        |x, out| {
            f(x, out);
            Ok(())
        },
        x,
        h,
    );
    match result {
        Ok(jacobian) => jacobian,
        Err(never) => match never {},
    }
}

/// Same as [`approximate_jacobian_fd`], but for functions that may fail.
pub fn try_approximate_jacobian_fd<'a, T, E>(
    m: usize,
    f: impl FnMut(DVectorView<T>, DVectorViewMut<T>) -> Result<(), E>,
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> Result<DMatrix<T>, E>
where
    T: Real,
{
    let x = x.into();
    let mut jacobian = DMatrix::zeros(m, x.len());
    fill_jacobian_fd(DMatrixViewMut::from(&mut jacobian), f, x, h)?;
    Ok(jacobian)
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn fill_jacobian_fd<T, E>(
    mut jacobian: DMatrixViewMut<T>,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>) -> Result<(), E>,
    mut x: DVectorViewMut<T>,
    h: T,
) -> Result<(), E>
where
    T: Real,
{
    let m = jacobian.nrows();
    assert_eq!(x.len(), jacobian.ncols(), "Jacobian must have one column per input");

    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    for j in 0..x.len() {
        let x_j = x[j];
        x[j] = x_j + h;
        let plus = f(DVectorView::from(&x), DVectorViewMut::from(&mut f_plus));
        x[j] = x_j - h;
        let minus = f(DVectorView::from(&x), DVectorViewMut::from(&mut f_minus));
        x[j] = x_j;
        plus?;
        minus?;

        // J[.., j] = (f(x + h e_j) - f(x - h e_j)) / 2h
        let mut column = jacobian.column_mut(j);
        column.copy_from(&f_plus);
        column -= &f_minus;
        column /= 2.0 * h;
    }

    Ok(())
}
