use thiserror::Error;

/// Errors raised while fitting or applying a linear discriminant analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LdaError {
    #[error("Row {row} has a missing class label. Missing values within the class column are not supported.")]
    MissingClassLabel { row: usize },

    #[error("{}", missing_feature_message(*row))]
    MissingFeatureValue { row: Option<usize> },

    #[error("{}", degenerate_message(*class_count, *predictor_count, empty_classes))]
    DegenerateProblem {
        class_count: usize,
        predictor_count: usize,
        /// Labels that were seen, but whose rows all contained missing values.
        empty_classes: Vec<String>,
    },

    #[error("{}", too_high_message(*requested, *max, *class_count, *predictor_count))]
    TargetDimensionTooHigh {
        requested: usize,
        max: usize,
        class_count: usize,
        predictor_count: usize,
    },

    #[error("The number of dimensions to project to must be a positive integer larger than 0, {requested} is invalid.")]
    InvalidTargetDimension { requested: usize },

    #[error(
        "The size of the smallest group must be larger than the number of predictor variables ({predictor_count}). \
         Class \"{class}\" has only {count} non-missing instance{}. Please reduce the number of selected predictor variables.",
        if *count == 1 { "" } else { "s" }
    )]
    InsufficientClassSize {
        class: String,
        count: usize,
        predictor_count: usize,
    },

    #[error("Cannot invert the within-class scatter matrix as it is singular. Most likely, two input columns are linearly dependent, i.e. differ only by a constant factor.")]
    SingularScatterMatrix,

    #[error("{}", column_missing_message(columns))]
    ColumnMissingFromInput { columns: Vec<String> },

    #[error("The number of dimensions to project to must be between 1 and {max}, {requested} is invalid.")]
    ProjectionDimensionOutOfRange { requested: usize, max: usize },

    #[error("Dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Row {row} belongs to class \"{label}\" which was not seen while accumulating class statistics")]
    UnknownClass { row: usize, label: String },

    #[error("Class statistics have already been normalized")]
    AlreadyNormalized,

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Execution cancelled")]
    Cancelled,
}

impl From<ndarray::ShapeError> for LdaError {
    fn from(err: ndarray::ShapeError) -> Self {
        LdaError::Shape(err.to_string())
    }
}

fn missing_feature_message(row: Option<usize>) -> String {
    let base = "Missing values are not supported. Please disable failing on missing values to skip such rows.";
    match row {
        Some(row) => format!("Row {row} contains a missing predictor value. {base}"),
        None => base.to_string(),
    }
}

fn degenerate_message(class_count: usize, predictor_count: usize, empty_classes: &[String]) -> String {
    let mut msg = String::from("The maximum allowed dimension is 0.");

    if class_count == 0 {
        msg.push_str(
            " There are no rows with a class label and complete predictor values. \
             Please provide a class column with at least two distinct values.",
        );
    } else if class_count == 1 {
        msg.push_str(
            " There is only one distinct value in the class column. \
             Please provide a class column with at least two distinct values.",
        );
    }

    if predictor_count == 0 {
        if class_count <= 1 {
            msg.push_str(" Also, t");
        } else {
            msg.push_str(" T");
        }
        msg.push_str("here are no predictor columns selected. Please select at least one.");
    }

    if !empty_classes.is_empty() {
        msg.push_str(&format!(
            " Note that all rows for class(es) ({}) contain missing values.",
            empty_classes.join(",")
        ));
    }
    msg
}

fn too_high_message(requested: usize, max: usize, class_count: usize, predictor_count: usize) -> String {
    let mut msg = format!(
        "The current number of selected dimensions ({requested}) is higher than the maximum allowed value of {max}."
    );

    let bounded_by_classes = max + 1 == class_count;
    let bounded_by_columns = max == predictor_count;

    if bounded_by_classes {
        msg.push_str(&format!(
            " The class column only features {class_count} distinct value{}",
            if class_count == 1 { "" } else { "s" }
        ));
        if !bounded_by_columns {
            msg.push('.');
        }
    }

    if bounded_by_columns {
        if bounded_by_classes {
            msg.push_str(" and o");
        } else {
            msg.push_str(" O");
        }
        msg.push_str(&format!(
            "nly {predictor_count} column{} selected.",
            if predictor_count == 1 { " is" } else { "s are" }
        ));
    }
    msg
}

fn column_missing_message(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    if quoted.len() == 1 {
        format!("The model is expecting column {} which is missing in the input table.", quoted[0])
    } else {
        format!(
            "The model is expecting columns {} which are missing in the input table.",
            quoted.join(", ")
        )
    }
}
