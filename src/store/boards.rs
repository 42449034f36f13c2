//! Boards, cards and card comments

use super::{ensure_exists, load_links, now, or_not_found, replace_links, Store};
use crate::error::{Result, TrackerError};
use crate::models::{
    AssigneeFilter, Board, BoardDetail, BoardInput, Card, CardComment, CardDetail, CardFilter,
    CardInput, CardPosition, CheckoutAction, CheckoutFilter, CheckoutOutcome, CommentInput,
};
use rusqlite::{params, Connection, Row};
use tracing::{info, warn};

const CARD_COLUMNS: &str = "id, title, description, card_type, status, position_x, position_y, \
     assigned_to, checked_out, primary_system_id, primary_workflow_id, primary_script_id, \
     created_by, created_at, updated_at";

/// Spacing used to place a new card clear of the existing ones
const CARD_OFFSET: f64 = 50.0;

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        card_type: row.get(3)?,
        status: row.get(4)?,
        position_x: row.get(5)?,
        position_y: row.get(6)?,
        assigned_to: row.get(7)?,
        checked_out: row.get(8)?,
        primary_system_id: row.get(9)?,
        primary_workflow_id: row.get(10)?,
        primary_script_id: row.get(11)?,
        systems: Vec::new(),
        workflows: Vec::new(),
        scripts: Vec::new(),
        created_by: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn with_card_links(conn: &Connection, mut card: Card) -> Result<Card> {
    card.systems = load_links(conn, "card_systems", "card_id", "system_id", card.id)?;
    card.workflows = load_links(conn, "card_workflows", "card_id", "workflow_id", card.id)?;
    card.scripts = load_links(conn, "card_scripts", "card_id", "script_id", card.id)?;
    Ok(card)
}

fn load_card(conn: &Connection, id: i64) -> Result<Card> {
    let card = or_not_found(
        conn.query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
            params![id],
            card_from_row,
        ),
        "card",
        id,
    )?;
    with_card_links(conn, card)
}

fn query_cards(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Card>> {
    let mut stmt = conn.prepare(sql)?;
    let cards = stmt
        .query_map(args, card_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    cards.into_iter().map(|c| with_card_links(conn, c)).collect()
}

fn check_card_refs(conn: &Connection, input: &CardInput) -> Result<()> {
    for (table, entity, ids) in [
        ("systems", "system", &input.systems),
        ("workflows", "workflow", &input.workflows),
        ("scripts", "script", &input.scripts),
    ] {
        for id in ids {
            ensure_exists(conn, table, entity, *id)?;
        }
    }
    for (table, entity, id) in [
        ("systems", "system", input.primary_system_id),
        ("workflows", "workflow", input.primary_workflow_id),
        ("scripts", "script", input.primary_script_id),
    ] {
        if let Some(id) = id {
            ensure_exists(conn, table, entity, id)?;
        }
    }
    Ok(())
}

fn write_card_links(conn: &Connection, id: i64, input: &CardInput) -> Result<()> {
    replace_links(conn, "card_systems", "card_id", "system_id", id, &input.systems)?;
    replace_links(conn, "card_workflows", "card_id", "workflow_id", id, &input.workflows)?;
    replace_links(conn, "card_scripts", "card_id", "script_id", id, &input.scripts)
}

fn insert_card(conn: &Connection, input: &CardInput, x: f64, y: f64) -> Result<i64> {
    let ts = now();
    conn.execute(
        "INSERT INTO cards (title, description, card_type, status, position_x, position_y,
             assigned_to, checked_out, primary_system_id, primary_workflow_id, primary_script_id,
             created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            input.title.trim(),
            input.description,
            input.card_type,
            input.status,
            x,
            y,
            input.assigned_to,
            input.primary_system_id,
            input.primary_workflow_id,
            input.primary_script_id,
            input.created_by,
            ts
        ],
    )?;
    let id = conn.last_insert_rowid();
    write_card_links(conn, id, input)?;
    Ok(id)
}

/// Next free spot: past the furthest card on each axis, or the origin offset.
fn next_card_position(conn: &Connection) -> Result<(f64, f64)> {
    let (max_x, max_y): (Option<f64>, Option<f64>) = conn.query_row(
        "SELECT MAX(position_x), MAX(position_y) FROM cards",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let place = |max: Option<f64>| match max {
        Some(m) if m > 0.0 => m + CARD_OFFSET,
        _ => CARD_OFFSET,
    };
    Ok((place(max_x), place(max_y)))
}

const BOARD_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
        systems: Vec::new(),
        workflows: Vec::new(),
        scripts: Vec::new(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn with_board_links(conn: &Connection, mut board: Board) -> Result<Board> {
    board.systems = load_links(conn, "board_systems", "board_id", "system_id", board.id)?;
    board.workflows = load_links(conn, "board_workflows", "board_id", "workflow_id", board.id)?;
    board.scripts = load_links(conn, "board_scripts", "board_id", "script_id", board.id)?;
    Ok(board)
}

fn load_board(conn: &Connection, id: i64) -> Result<Board> {
    let board = or_not_found(
        conn.query_row(
            &format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = ?1"),
            params![id],
            board_from_row,
        ),
        "board",
        id,
    )?;
    with_board_links(conn, board)
}

fn write_board_links(conn: &Connection, id: i64, input: &BoardInput) -> Result<()> {
    for (table, entity, ids) in [
        ("systems", "system", &input.systems),
        ("workflows", "workflow", &input.workflows),
        ("scripts", "script", &input.scripts),
    ] {
        for other in ids {
            ensure_exists(conn, table, entity, *other)?;
        }
    }
    replace_links(conn, "board_systems", "board_id", "system_id", id, &input.systems)?;
    replace_links(conn, "board_workflows", "board_id", "workflow_id", id, &input.workflows)?;
    replace_links(conn, "board_scripts", "board_id", "script_id", id, &input.scripts)
}

impl Store {
    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {BOARD_COLUMNS} FROM boards ORDER BY name, id"))?;
        let boards = stmt
            .query_map([], board_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        boards
            .into_iter()
            .map(|b| with_board_links(&conn, b))
            .collect()
    }

    pub fn create_board(&self, input: &BoardInput) -> Result<Board> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let ts = now();
        tx.execute(
            "INSERT INTO boards (name, description, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![input.name.trim(), input.description, input.created_by, ts],
        )?;
        let id = tx.last_insert_rowid();
        write_board_links(&tx, id, input)?;
        let board = load_board(&tx, id)?;
        tx.commit()?;
        info!(board_id = id, name = %board.name, "Created board");
        Ok(board)
    }

    pub fn get_board(&self, id: i64) -> Result<Board> {
        let conn = self.conn()?;
        load_board(&conn, id)
    }

    pub fn update_board(&self, id: i64, input: &BoardInput) -> Result<Board> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE boards SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![input.name.trim(), input.description, now(), id],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("board", id));
        }
        write_board_links(&tx, id, input)?;
        let board = load_board(&tx, id)?;
        tx.commit()?;
        info!(board_id = id, "Updated board");
        Ok(board)
    }

    pub fn delete_board(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM boards WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(TrackerError::not_found("board", id));
        }
        info!(board_id = id, "Deleted board");
        Ok(())
    }

    /// The board plus its cards: those related to any context system,
    /// workflow or script, or every card when the board has no context.
    pub fn board_detail(&self, id: i64) -> Result<BoardDetail> {
        let conn = self.conn()?;
        let board = load_board(&conn, id)?;

        let cards = if board.has_context() {
            query_cards(
                &conn,
                &format!(
                    "SELECT {CARD_COLUMNS} FROM cards c WHERE
                       EXISTS (SELECT 1 FROM card_systems cs JOIN board_systems bs
                               ON bs.system_id = cs.system_id
                               WHERE cs.card_id = c.id AND bs.board_id = ?1)
                    OR EXISTS (SELECT 1 FROM card_workflows cw JOIN board_workflows bw
                               ON bw.workflow_id = cw.workflow_id
                               WHERE cw.card_id = c.id AND bw.board_id = ?1)
                    OR EXISTS (SELECT 1 FROM card_scripts cx JOIN board_scripts bx
                               ON bx.script_id = cx.script_id
                               WHERE cx.card_id = c.id AND bx.board_id = ?1)
                    ORDER BY c.updated_at DESC, c.id DESC"
                ),
                params![id],
            )?
        } else {
            query_cards(
                &conn,
                &format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY updated_at DESC, id DESC"),
                [],
            )?
        };

        Ok(BoardDetail { board, cards })
    }

    /// Cards newest-updated first, narrowed by `filter`
    pub fn list_cards(&self, filter: &CardFilter) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        let (assignee, unassigned) = match &filter.assigned_to {
            Some(AssigneeFilter::User(name)) => (Some(name.as_str()), false),
            Some(AssigneeFilter::Unassigned) => (None, true),
            None => (None, false),
        };
        let checked_out = filter
            .checked_out
            .map(|c| matches!(c, CheckoutFilter::CheckedOut));
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        query_cards(
            &conn,
            &format!(
                "SELECT {CARD_COLUMNS} FROM cards c WHERE
                     (?1 IS NULL OR c.status = ?1)
                 AND (?2 IS NULL OR c.card_type = ?2)
                 AND (?3 IS NULL OR EXISTS (SELECT 1 FROM card_systems
                                            WHERE card_id = c.id AND system_id = ?3))
                 AND (?4 IS NULL OR EXISTS (SELECT 1 FROM card_workflows
                                            WHERE card_id = c.id AND workflow_id = ?4))
                 AND (?5 IS NULL OR EXISTS (SELECT 1 FROM card_scripts
                                            WHERE card_id = c.id AND script_id = ?5))
                 AND (?6 IS NULL OR c.assigned_to = ?6)
                 AND (?7 = 0 OR c.assigned_to IS NULL)
                 AND (?8 IS NULL OR c.checked_out = ?8)
                 AND (?9 IS NULL OR instr(lower(c.title), lower(?9)) > 0
                                 OR instr(lower(c.description), lower(?9)) > 0)
                 ORDER BY c.updated_at DESC, c.id DESC"
            ),
            params![
                filter.status,
                filter.card_type,
                filter.system,
                filter.workflow,
                filter.script,
                assignee,
                unassigned,
                checked_out,
                search
            ],
        )
    }

    pub fn create_card(&self, input: &CardInput) -> Result<Card> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        check_card_refs(&tx, input)?;
        let id = insert_card(
            &tx,
            input,
            input.position_x.unwrap_or(0.0),
            input.position_y.unwrap_or(0.0),
        )?;
        let card = load_card(&tx, id)?;
        tx.commit()?;
        info!(card_id = id, title = %card.title, "Created card");
        Ok(card)
    }

    /// Create a card placed past the existing cards. Empty relation lists
    /// take the board's context.
    pub fn create_card_on_board(&self, board_id: i64, input: &CardInput) -> Result<Card> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let board = load_board(&tx, board_id)?;

        let mut input = input.clone();
        if input.systems.is_empty() {
            input.systems = board.systems.clone();
        }
        if input.workflows.is_empty() {
            input.workflows = board.workflows.clone();
        }
        if input.scripts.is_empty() {
            input.scripts = board.scripts.clone();
        }
        check_card_refs(&tx, &input)?;

        let (x, y) = next_card_position(&tx)?;
        let id = insert_card(&tx, &input, x, y)?;
        let card = load_card(&tx, id)?;
        tx.commit()?;
        info!(card_id = id, board_id, x, y, "Created card on board");
        Ok(card)
    }

    pub fn get_card(&self, id: i64) -> Result<Card> {
        let conn = self.conn()?;
        load_card(&conn, id)
    }

    pub fn card_detail(&self, id: i64) -> Result<CardDetail> {
        let conn = self.conn()?;
        let card = load_card(&conn, id)?;
        let mut stmt = conn.prepare(
            "SELECT id, card_id, author, text, created_at FROM card_comments
             WHERE card_id = ?1 ORDER BY created_at, id",
        )?;
        let comments = stmt
            .query_map(params![id], comment_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(CardDetail { card, comments })
    }

    /// Replace a card's fields and relations. Position and checkout state
    /// have their own operations and are kept unless positions are given.
    pub fn update_card(&self, id: i64, input: &CardInput) -> Result<Card> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = load_card(&tx, id)?;
        check_card_refs(&tx, input)?;
        tx.execute(
            "UPDATE cards SET title = ?1, description = ?2, card_type = ?3, status = ?4,
                 position_x = ?5, position_y = ?6, assigned_to = ?7, primary_system_id = ?8,
                 primary_workflow_id = ?9, primary_script_id = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                input.title.trim(),
                input.description,
                input.card_type,
                input.status,
                input.position_x.unwrap_or(current.position_x),
                input.position_y.unwrap_or(current.position_y),
                input.assigned_to,
                input.primary_system_id,
                input.primary_workflow_id,
                input.primary_script_id,
                now(),
                id
            ],
        )?;
        write_card_links(&tx, id, input)?;
        let card = load_card(&tx, id)?;
        tx.commit()?;
        info!(card_id = id, "Updated card");
        Ok(card)
    }

    pub fn delete_card(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(TrackerError::not_found("card", id));
        }
        info!(card_id = id, "Deleted card");
        Ok(())
    }

    /// Check a card out to `user`, or back in if `user` holds it.
    pub fn toggle_checkout(&self, id: i64, user: &str) -> Result<CheckoutOutcome> {
        let user = user.trim();
        if user.is_empty() {
            return Err(TrackerError::Validation("user is required".to_string()));
        }
        let conn = self.conn()?;
        let card = load_card(&conn, id)?;

        let action = match (card.checked_out, card.assigned_to.as_deref()) {
            (true, Some(holder)) if holder == user => {
                conn.execute(
                    "UPDATE cards SET checked_out = 0, updated_at = ?1 WHERE id = ?2",
                    params![now(), id],
                )?;
                CheckoutAction::CheckedIn
            }
            (true, holder) => {
                warn!(card_id = id, user, holder = ?holder, "Card already checked out");
                return Err(TrackerError::Conflict(format!(
                    "card '{}' is already checked out by {}",
                    card.title,
                    holder.unwrap_or("someone else")
                )));
            }
            (false, _) => {
                conn.execute(
                    "UPDATE cards SET checked_out = 1, assigned_to = ?1, updated_at = ?2
                     WHERE id = ?3",
                    params![user, now(), id],
                )?;
                CheckoutAction::CheckedOut
            }
        };

        info!(card_id = id, user, ?action, "Toggled card checkout");
        Ok(CheckoutOutcome {
            action,
            card: load_card(&conn, id)?,
        })
    }

    pub fn save_card_position(&self, position: &CardPosition) -> Result<Card> {
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(TrackerError::Validation(
                "card position must be finite numbers".to_string(),
            ));
        }
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE cards SET position_x = ?1, position_y = ?2 WHERE id = ?3",
            params![position.x, position.y, position.id],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("card", position.id));
        }
        load_card(&conn, position.id)
    }

    pub fn add_comment(&self, card_id: i64, input: &CommentInput) -> Result<CardComment> {
        input.validate()?;
        let conn = self.conn()?;
        ensure_exists(&conn, "cards", "card", card_id)?;
        conn.execute(
            "INSERT INTO card_comments (card_id, author, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![card_id, input.author.trim(), input.text, now()],
        )?;
        let id = conn.last_insert_rowid();
        info!(card_id, comment_id = id, "Added card comment");
        let comment = conn.query_row(
            "SELECT id, card_id, author, text, created_at FROM card_comments WHERE id = ?1",
            params![id],
            comment_from_row,
        )?;
        Ok(comment)
    }
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CardComment> {
    Ok(CardComment {
        id: row.get(0)?,
        card_id: row.get(1)?,
        author: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardStatus, CardType, SystemCategory, SystemInput};

    fn system(store: &Store, name: &str) -> i64 {
        store
            .create_system(&SystemInput::new(name, SystemCategory::Core))
            .unwrap()
            .id
    }

    #[test]
    fn test_checkout_toggle() {
        let store = Store::in_memory().unwrap();
        let card = store.create_card(&CardInput::new("Upgrade Postgres")).unwrap();
        assert!(!card.checked_out);

        let out = store.toggle_checkout(card.id, "dana").unwrap();
        assert_eq!(out.action, CheckoutAction::CheckedOut);
        assert!(out.card.checked_out);
        assert_eq!(out.card.assigned_to.as_deref(), Some("dana"));

        assert!(matches!(
            store.toggle_checkout(card.id, "lee"),
            Err(TrackerError::Conflict(_))
        ));

        let back = store.toggle_checkout(card.id, "dana").unwrap();
        assert_eq!(back.action, CheckoutAction::CheckedIn);
        assert!(!back.card.checked_out);
        assert_eq!(back.card.assigned_to.as_deref(), Some("dana"));

        let lee = store.toggle_checkout(card.id, "lee").unwrap();
        assert_eq!(lee.card.assigned_to.as_deref(), Some("lee"));
    }

    #[test]
    fn test_card_on_board_position_and_context() {
        let store = Store::in_memory().unwrap();
        let banner = system(&store, "Banner");
        let mut board = BoardInput::new("Banner work");
        board.systems = vec![banner];
        let board = store.create_board(&board).unwrap();

        let first = store
            .create_card_on_board(board.id, &CardInput::new("First"))
            .unwrap();
        assert_eq!((first.position_x, first.position_y), (50.0, 50.0));
        assert_eq!(first.systems, vec![banner]);

        store
            .save_card_position(&CardPosition {
                id: first.id,
                x: 300.0,
                y: 120.0,
            })
            .unwrap();
        let second = store
            .create_card_on_board(board.id, &CardInput::new("Second"))
            .unwrap();
        assert_eq!((second.position_x, second.position_y), (350.0, 170.0));
    }

    #[test]
    fn test_board_detail_filters_by_context() {
        let store = Store::in_memory().unwrap();
        let banner = system(&store, "Banner");
        let slate = system(&store, "Slate");

        let mut on_banner = CardInput::new("Banner bug");
        on_banner.systems = vec![banner];
        store.create_card(&on_banner).unwrap();
        let mut on_slate = CardInput::new("Slate idea");
        on_slate.systems = vec![slate];
        store.create_card(&on_slate).unwrap();

        let mut input = BoardInput::new("Banner");
        input.systems = vec![banner];
        let scoped = store.create_board(&input).unwrap();
        let detail = store.board_detail(scoped.id).unwrap();
        assert_eq!(detail.cards.len(), 1);
        assert_eq!(detail.cards[0].title, "Banner bug");

        let everything = store.create_board(&BoardInput::new("All")).unwrap();
        assert_eq!(store.board_detail(everything.id).unwrap().cards.len(), 2);
    }

    #[test]
    fn test_card_filters() {
        let store = Store::in_memory().unwrap();
        let banner = system(&store, "Banner");

        let mut a = CardInput::new("Rotate TLS certificates");
        a.card_type = CardType::Task;
        a.status = CardStatus::InProgress;
        a.systems = vec![banner];
        a.assigned_to = Some("dana".to_string());
        let a = store.create_card(&a).unwrap();

        let mut b = CardInput::new("Dark mode");
        b.card_type = CardType::Idea;
        b.description = "Users asked for a darker THEME".to_string();
        store.create_card(&b).unwrap();

        let by_status = store
            .list_cards(&CardFilter {
                status: Some(CardStatus::InProgress),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_status.len(), 1);

        let by_system = store
            .list_cards(&CardFilter {
                system: Some(banner),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_system[0].id, a.id);

        let unassigned = store
            .list_cards(&CardFilter {
                assigned_to: Some(AssigneeFilter::Unassigned),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(unassigned[0].title, "Dark mode");

        let dana = store
            .list_cards(&CardFilter {
                assigned_to: Some(AssigneeFilter::User("dana".to_string())),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(dana.len(), 1);

        let search = store
            .list_cards(&CardFilter {
                search: Some("theme".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(search.len(), 1);

        store.toggle_checkout(a.id, "dana").unwrap();
        let out = store
            .list_cards(&CardFilter {
                checked_out: Some(CheckoutFilter::CheckedOut),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(out.len(), 1);
        let free = store
            .list_cards(&CardFilter {
                checked_out: Some(CheckoutFilter::NotCheckedOut),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(free[0].title, "Dark mode");
    }

    #[test]
    fn test_comments_oldest_first() {
        let store = Store::in_memory().unwrap();
        let card = store.create_card(&CardInput::new("Audit")).unwrap();
        for text in ["first", "second"] {
            store
                .add_comment(
                    card.id,
                    &CommentInput {
                        author: "dana".to_string(),
                        text: text.to_string(),
                    },
                )
                .unwrap();
        }
        let detail = store.card_detail(card.id).unwrap();
        let texts: Vec<&str> = detail.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        store.delete_card(card.id).unwrap();
        assert!(store.card_detail(card.id).is_err());
    }
}
