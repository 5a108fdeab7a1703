macro_rules! bail {
    ($err:expr $(,)?) => {
        return Err($err)
    };
}

macro_rules! ensure_active {
    ($bar:expr) => {
        if $bar.ended {
            bail!(crate::errors::Error::Immutable)
        }
    };
}

macro_rules! round_to {
    ($value:expr, $digits:expr) => {{
        let factor = 10f64.powi($digits as i32);
        ($value * factor).round() / factor
    }};
}
