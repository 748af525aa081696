/// Lightweight test harness for whole escrow sessions
///
/// Runs the depositor, every agent and the authority in-process over real
/// channels, with freshly generated keys and an in-memory reference copy.
/// Agents can be sabotaged before the run by swapping their private key,
/// so their deposit no longer decrypts.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::TestEscrow;
///
/// #[tokio::test]
/// async fn test_two_saboteurs() -> anyhow::Result<()> {
///     let report = TestEscrow::new(5, 3)?
///         .sabotage(4)?
///         .sabotage(5)?
///         .run()
///         .await?;
///
///     assert!(report.is_verified());
///     Ok(())
/// }
/// ```
mod escrow;

pub use escrow::TestEscrow;
