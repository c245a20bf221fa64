use crate::{
    db::store::{ColumnRead, RowColumns},
    error::{InternalError, StoreError},
    types::{ColumnId, Dnt},
};

/// Read a fixed-width u32 column; `None` when the column is null.
pub(crate) fn read_u32<R>(row: &mut R, column: ColumnId) -> Result<Option<u32>, InternalError>
where
    R: RowColumns + ?Sized,
{
    let mut buf = [0u8; 4];
    match row
        .retrieve_column(column, &mut buf)
        .map_err(InternalError::from_store)?
    {
        ColumnRead::Null => Ok(None),
        ColumnRead::Value(4) => Ok(Some(u32::from_le_bytes(buf))),
        ColumnRead::Value(len) | ColumnRead::Truncated { required: len } => {
            Err(InternalError::store_corruption(format!(
                "column {column:?} holds {len} bytes, expected 4"
            )))
        }
    }
}

pub(crate) fn read_dnt<R>(row: &mut R, column: ColumnId) -> Result<Option<Dnt>, InternalError>
where
    R: RowColumns + ?Sized,
{
    Ok(read_u32(row, column)?.map(Dnt))
}

/// Boolean columns are stored as u32; null reads as `false`.
pub(crate) fn read_flag<R>(row: &mut R, column: ColumnId) -> Result<bool, InternalError>
where
    R: RowColumns + ?Sized,
{
    Ok(read_u32(row, column)?.is_some_and(|v| v != 0))
}

/// Read a variable-width column into a reusable buffer, growing it once on
/// truncation. Returns `false` for a null column.
pub(crate) fn read_bytes_into<F>(buf: &mut Vec<u8>, mut read: F) -> Result<bool, InternalError>
where
    F: FnMut(&mut [u8]) -> Result<ColumnRead, StoreError>,
{
    let capacity = buf.capacity().max(1);
    buf.resize(capacity, 0);

    let len = match read(buf.as_mut_slice()).map_err(InternalError::from_store)? {
        ColumnRead::Null => {
            buf.clear();
            return Ok(false);
        }
        ColumnRead::Value(len) => len,
        ColumnRead::Truncated { required } => {
            buf.resize(required, 0);
            match read(buf.as_mut_slice()).map_err(InternalError::from_store)? {
                ColumnRead::Value(len) => len,
                ColumnRead::Null => {
                    buf.clear();
                    return Ok(false);
                }
                ColumnRead::Truncated { required } => {
                    return Err(InternalError::store_corruption(format!(
                        "column still truncated after growing buffer to {} (needs {required})",
                        buf.len()
                    )));
                }
            }
        }
    };

    buf.truncate(len);

    Ok(true)
}
