//! Class merge groups
//!
//! Small and asynchronous classes are pooled into merge groups so that
//! their students have enough classmates' data to work with. Classes join
//! the newest group in order until the group is big enough, after which a
//! new group is started. A class only sees the classes that joined its
//! group before it (or all of them when merge order is ignored).

use cosmicds_common::Result;
use sqlx::SqliteConnection;
use tracing::info;

use super::models::MergeGroupMember;

/// A group stops accepting classes once it holds this many students
pub const MERGE_GROUP_TARGET_SIZE: i64 = 20;

pub async fn group_for_class(
    conn: &mut SqliteConnection,
    class_id: i64,
) -> Result<Option<MergeGroupMember>> {
    let member = sqlx::query_as::<_, MergeGroupMember>(
        "SELECT group_id, class_id, merge_order FROM hubble_class_merge_groups WHERE class_id = ?",
    )
    .bind(class_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(member)
}

/// IDs of the classes merged with `class_id`, itself included, in merge order
pub async fn merged_ids_for_class(
    conn: &mut SqliteConnection,
    class_id: i64,
    ignore_merge_order: bool,
) -> Result<Vec<i64>> {
    let Some(member) = group_for_class(conn, class_id).await? else {
        return Ok(vec![class_id]);
    };

    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT class_id FROM hubble_class_merge_groups
        WHERE group_id = ? AND (? OR merge_order <= ?)
        ORDER BY merge_order
        "#,
    )
    .bind(member.group_id)
    .bind(ignore_merge_order)
    .bind(member.merge_order)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Size a group counts for: enrolled students, or the expected size while
/// the class is still filling up
async fn group_size(conn: &mut SqliteConnection, group_id: i64) -> Result<i64> {
    let size: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT SUM(MAX(c.expected_size, (
            SELECT COUNT(*) FROM students_classes sc WHERE sc.class_id = c.id
        )))
        FROM hubble_class_merge_groups mg
        INNER JOIN classes c ON c.id = mg.class_id
        WHERE mg.group_id = ?
        "#,
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(size.unwrap_or(0))
}

/// Put a class into a merge group and return the group ID. A class that
/// already belongs to a group stays where it is.
pub async fn add_class_to_merge_group(conn: &mut SqliteConnection, class_id: i64) -> Result<i64> {
    if let Some(member) = group_for_class(conn, class_id).await? {
        return Ok(member.group_id);
    }

    let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(group_id) FROM hubble_class_merge_groups")
        .fetch_one(&mut *conn)
        .await?;

    let (group_id, merge_order) = match latest {
        Some(group_id) => {
            if group_size(conn, group_id).await? < MERGE_GROUP_TARGET_SIZE {
                let last_order: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(merge_order), 0) FROM hubble_class_merge_groups WHERE group_id = ?",
                )
                .bind(group_id)
                .fetch_one(&mut *conn)
                .await?;
                (group_id, last_order + 1)
            } else {
                (group_id + 1, 1)
            }
        }
        None => (1, 1),
    };

    sqlx::query("INSERT INTO hubble_class_merge_groups (group_id, class_id, merge_order) VALUES (?, ?, ?)")
        .bind(group_id)
        .bind(class_id)
        .bind(merge_order)
        .execute(&mut *conn)
        .await?;

    info!("Class {} joined merge group {} at position {}", class_id, group_id, merge_order);
    Ok(group_id)
}
